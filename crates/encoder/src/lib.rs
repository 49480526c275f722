//! # Screw Encoder
//!
//! Rewrites text as a JavaScript expression over the six characters
//! `! ( ) + [ ]` that evaluates back to the text.
//!
//! Letters and punctuation are pulled out of the string forms of values the
//! alphabet can build: `![]+[]` is `"false"`, and indexing it gives `f`, `a`,
//! `l`, `s` and `e`. Which values are available, and what their string forms
//! look like, depends on the engine, so every definition is guarded by the
//! capabilities it needs.
//!
//! ## Architecture
//!
//! ```text
//! capability names
//!     │
//!     ├──> CapabilityRegistry → Mask
//!     │
//!     ├──> Encoder (one per mask, caches every solution)
//!     │    ├─> Resolver: shortest satisfiable definition per character/constant
//!     │    ├─> Compiler: template → restricted-alphabet text
//!     │    └─> Padding: align characters read from native function source
//!     │
//!     └──> ScrewBuffer
//!          ├─> Join solutions with `+`, keeping string concatenation
//!          └─> Split long runs into nested groups
//! ```
//!
//! ## Example
//!
//! ```rust
//! use screw_encoder::{encode, EncodeOptions};
//!
//! let output = encode("false", &EncodeOptions::default()).unwrap();
//! assert_eq!(output, "![]+[]");
//!
//! let options = EncodeOptions::default().with_capabilities(["NODE"]);
//! let output = encode("Hello", &options).unwrap();
//! assert!(output.chars().all(|ch| "!()+[]".contains(ch)));
//! ```

mod buffer;
mod compiler;
mod config;
mod definitions;
mod encoder;
mod error;
mod express;
mod fallback;
pub mod nesting;
mod numeric;
mod padding;
mod session;
mod solution;
mod tables;

pub use buffer::{sequence, Assembly, ScrewBuffer};
pub use compiler::BondStrength;
pub use config::{EncoderConfig, MAX_GROUP_THRESHOLD};
pub use definitions::{
    find_definition, CharAt, Definition, Definitions, Entry, Expr, FallbackEncoder, Simple,
    Tables,
};
pub use encoder::{encode_digit, Encoder};
pub use error::{EncoderError, Result};
pub use express::{parse, Op, Operand, ParseError, Primary, Unit};
pub use numeric::format_number;
pub use padding::{PaddingFamily, PaddingInfo, PaddingTables};
pub use session::{EncodeOptions, Screw};
pub use solution::{has_outer_plus, Level, Solution};

pub use screw_features;

use screw_features::CapabilityRegistry;

/// Encode `text` with a one-off session
pub fn encode(text: &str, options: &EncodeOptions) -> Result<String> {
    Screw::new().encode(text, options)
}

/// Whether every named capability is available in the current engine
pub fn capabilities_available<I, S>(names: I) -> Result<bool>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(CapabilityRegistry::builtin().are_available(names)?)
}

/// Whether the named capabilities can hold in one engine at the same time
pub fn capabilities_compatible<I, S>(names: I) -> Result<bool>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(CapabilityRegistry::builtin().are_compatible(names)?)
}
