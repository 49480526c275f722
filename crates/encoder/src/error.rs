use screw_features::CapabilityError;
use thiserror::Error;

/// Result type for encoder operations
pub type Result<T> = std::result::Result<T, EncoderError>;

fn in_definition(context: &Option<String>) -> String {
    context
        .as_ref()
        .map(|key| format!(" in the definition of {key}"))
        .unwrap_or_default()
}

/// Errors that can occur while resolving definitions or encoding text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncoderError {
    /// Unknown or incompatible capabilities requested
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// A definition refers back to itself
    #[error("Circular reference detected: {chain}")]
    CircularDefinition { chain: String },

    /// A template names an identifier with no definition
    #[error("Undefined identifier {name}{}", in_definition(.context))]
    UndefinedReference {
        name: String,
        context: Option<String>,
    },

    /// A malformed template
    #[error("{message}{}", in_definition(.context))]
    Syntax {
        message: String,
        context: Option<String>,
    },

    /// A gap in the padding tables
    #[error("{message}{}", in_definition(.context))]
    Padding {
        message: String,
        context: Option<String>,
    },

    /// No candidate fits the encoder's limits
    #[error("Unencodable input: {0}")]
    UnencodableInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EncoderError {
    /// Create a syntax error tagged with the key being resolved
    pub fn syntax(message: impl Into<String>, context: Option<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            context,
        }
    }

    /// Create a padding table error tagged with the key being resolved
    pub fn padding(message: impl Into<String>, context: Option<String>) -> Self {
        Self::Padding {
            message: message.into(),
            context,
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
