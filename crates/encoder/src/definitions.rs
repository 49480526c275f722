use crate::padding::{PaddingFamily, PaddingTables};
use crate::solution::Level;
use screw_features::Mask;
use std::collections::HashMap;

/// Candidate guarded by the capabilities it requires
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T = Definition> {
    pub mask: Mask,
    pub definition: T,
}

impl<T> Entry<T> {
    pub const fn new(definition: T, mask: Mask) -> Self {
        Self { mask, definition }
    }
}

/// Template text with optional metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expr {
    pub text: &'static str,
    /// Level of the produced value when it is not the key's default
    pub level: Option<Level>,
    /// Assemble string literals with the group boundary optimizer
    pub optimize: bool,
}

impl Expr {
    pub const fn new(text: &'static str) -> Self {
        Self {
            text,
            level: None,
            optimize: false,
        }
    }

    #[must_use]
    pub const fn optimized(mut self) -> Self {
        self.optimize = true;
        self
    }
}

/// Extraction of the character at `index` of the string form of `expr`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharAt {
    pub expr: &'static str,
    pub index: usize,
    pub family: PaddingFamily,
}

/// Payload of a definition entry
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// Micro-expression template
    Expr(Expr),
    /// Alternatives tried from the end; the last satisfiable one wins
    Nested(Vec<Entry>),
    /// Decimal digit, encoded as a numeric value
    Digit(u8),
    /// Character read out of a native function representation
    CharAt(CharAt),
    /// Route the character to the default code-point encoder
    Fallback,
}

/// All definitions registered for one key
#[derive(Debug, Clone, PartialEq)]
pub enum Definitions {
    /// One unconditional definition, resolved once with no capabilities
    Static(Definition),
    /// Alternatives searched for the shortest output
    Entries(Vec<Entry>),
}

/// Code-point based encoders for characters without a dedicated definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEncoder {
    /// `unescape("%XX")`
    Unescape8,
    /// `unescape("%uXXXX")`
    Unescape16,
    /// `atob(…)` on a crafted base64 string
    Atob,
    /// `Function("return\"\uXXXX\"")()`
    Eval,
}

/// Literal that costs nothing to look up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simple {
    pub name: &'static str,
    pub expr: &'static str,
    pub level: Level,
}

/// Static definition data consumed by the resolver
#[derive(Debug, Clone)]
pub struct Tables {
    pub characters: HashMap<char, Definitions>,
    pub constants: HashMap<&'static str, Definitions>,
    /// Multi-character substrings with a dedicated encoding, in match priority order
    pub complex: Vec<(&'static str, Vec<Entry>)>,
    pub simple: Vec<Simple>,
    pub padding: PaddingTables,
    pub default_8_bit: Vec<Entry<FallbackEncoder>>,
    pub default_16_bit: Vec<Entry<FallbackEncoder>>,
    /// Cheapest spelling of the hex digit eleven
    pub optimal_b: Vec<Entry<char>>,
}

impl Tables {
    pub fn simple(&self, name: &str) -> Option<&Simple> {
        self.simple.iter().find(|simple| simple.name == name)
    }

    pub fn complex_entries(&self, complex: &str) -> Option<&[Entry]> {
        self.complex
            .iter()
            .find(|(name, _)| *name == complex)
            .map(|(_, entries)| entries.as_slice())
    }
}

/// Last entry whose mask is included in `mask`
pub fn find_definition<T>(entries: &[Entry<T>], mask: Mask) -> Option<&T> {
    entries
        .iter()
        .rev()
        .find(|entry| mask.includes(entry.mask))
        .map(|entry| &entry.definition)
}
