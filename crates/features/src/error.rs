use thiserror::Error;

/// Result type for capability operations
pub type Result<T> = std::result::Result<T, CapabilityError>;

/// Errors raised while building or querying a capability registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// A capability name that is not registered
    #[error("Unknown feature {0:?}")]
    Unknown(String),

    /// The requested capabilities contain a mutually exclusive pair
    #[error("Incompatible features: {}", .0.join(", "))]
    Incompatible(Vec<String>),

    /// More elementary capabilities than mask bits
    #[error("Too many elementary features: {count} (a mask holds at most {capacity})")]
    TooMany { count: usize, capacity: u32 },

    /// Includes that loop back on themselves
    #[error("Circular feature inclusion: {0}")]
    CircularInclude(String),

    /// The same name registered twice
    #[error("Feature {0:?} is already defined")]
    Duplicate(String),
}

impl CapabilityError {
    /// Create an unknown capability error
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::Unknown(name.into())
    }
}
