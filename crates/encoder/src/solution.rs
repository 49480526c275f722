use serde::Serialize;
use std::fmt;

/// Kind of value a piece of output evaluates to.
///
/// The ordering matters: anything below `Object` adds numerically when joined
/// with `+`, so two such fragments cannot be concatenated directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Level {
    Undefined,
    Numeric,
    Object,
    String,
}

/// Resolved output for a character, constant or complex substring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Solution {
    pub replacement: String,
    pub level: Level,
    /// Contains a `+` outside brackets that is not preceded by `!`
    pub outer_plus: bool,
    /// Index of the winning candidate when chosen by length-optimal search
    pub entry_index: Option<usize>,
}

impl Solution {
    /// Create a solution, computing `outer_plus` from the text
    pub fn new(replacement: impl Into<String>, level: Level) -> Self {
        let replacement = replacement.into();
        let outer_plus = has_outer_plus(&replacement);
        Self {
            replacement,
            level,
            outer_plus,
            entry_index: None,
        }
    }

    /// Create a solution with a known `outer_plus` flag
    pub fn with_outer_plus(replacement: impl Into<String>, level: Level, outer_plus: bool) -> Self {
        Self {
            replacement: replacement.into(),
            level,
            outer_plus,
            entry_index: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.replacement.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replacement.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.replacement
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.replacement)
    }
}

/// Whether `text` has a plus sign out of brackets not preceded by `!`
pub fn has_outer_plus(text: &str) -> bool {
    let mut unclosed = 0usize;
    let mut previous = None;
    for ch in text.chars() {
        match ch {
            '+' if unclosed == 0 && previous != Some('!') => return true,
            '(' | '[' => unclosed += 1,
            ')' | ']' => unclosed = unclosed.saturating_sub(1),
            _ => {}
        }
        // "!+" is consumed as a pair
        previous = if previous == Some('!') && ch == '+' {
            None
        } else {
            Some(ch)
        };
    }
    false
}
