//! Structural measurements of restricted-alphabet output.

use serde::Serialize;

/// Bracket nesting and flat `+` chain length of an expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NestingStats {
    /// Deepest bracket nesting, counting `(` and `[`
    pub max_depth: usize,
    /// Most operands joined by binary `+` at one bracket level
    pub max_chain: usize,
}

/// Measure nesting by scanning brackets.
///
/// A `+` is binary when it follows `)` or `]`; any other `+` is a prefix
/// operator and does not extend a chain.
pub fn measure(text: &str) -> NestingStats {
    let mut stats = NestingStats::default();
    // Binary plus count of every open bracket level, outermost first
    let mut chains = vec![0usize];
    let mut previous = None;
    for ch in text.chars() {
        match ch {
            '(' | '[' => {
                chains.push(0);
                stats.max_depth = stats.max_depth.max(chains.len() - 1);
            }
            ')' | ']' => {
                if chains.len() > 1 {
                    let pluses = chains.pop().unwrap_or_default();
                    stats.max_chain = stats.max_chain.max(pluses + 1);
                }
            }
            '+' if matches!(previous, Some(')' | ']')) => {
                if let Some(pluses) = chains.last_mut() {
                    *pluses += 1;
                }
            }
            _ => {}
        }
        if !ch.is_whitespace() {
            previous = Some(ch);
        }
    }
    for pluses in chains {
        stats.max_chain = stats.max_chain.max(pluses + 1);
    }
    stats
}
