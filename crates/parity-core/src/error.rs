//! Error types for the handler pipeline
//!
//! Every failure in the pipeline is local and recoverable: the handler
//! collection reports the error, skips the offending item and keeps going.

use thiserror::Error;

/// Core error type for handler pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing required field or unreadable configuration section
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The factory has no constructor for this type tag
    #[error("Unknown handler type: {0}")]
    UnknownType(String),

    /// A handler was created but this collection cannot hold it
    #[error("Handler {name} of type {type_tag} cannot be stored in this collection")]
    CapabilityMismatch { name: String, type_tag: String },

    /// A handler with the same name is already present
    #[error("Handler {0} already exists")]
    DuplicateName(String),

    /// Insertion of an empty handler slot
    #[error("Null handler")]
    NullHandler,

    /// Two collections differ in length
    #[error("Size mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        context: String,
    },

    /// Paired handlers have different runtime types
    #[error("Type mismatch: {expected} cannot combine with {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Paired handlers of the same type were configured differently
    #[error("Handler {name} cannot combine: {detail}")]
    Incompatible { name: String, detail: String },

    /// A handler referenced a channel the measurement streams do not provide
    #[error("Channel error: {0}")]
    Channel(String),

    /// The measurement source is unavailable
    #[error("Stream error: {0}")]
    Streams(String),

    /// JSON map file error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (for map files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error for a missing required configuration field
    pub fn missing_field(key: &str, section: &str) -> Self {
        Self::Configuration(format!("No {key} defined in section for handler {section}"))
    }

    /// Create an error for two handlers whose types cannot be combined
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an error for size mismatch
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::ShapeMismatch {
            expected,
            actual,
            context: context.to_string(),
        }
    }

    /// Create an error for same-type handlers whose configurations differ
    pub fn incompatible(name: &str, detail: impl Into<String>) -> Self {
        Self::Incompatible {
            name: name.to_string(),
            detail: detail.into(),
        }
    }

    /// Whether this error was raised by the merge/assign protocol
    pub fn is_merge_error(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::TypeMismatch { .. } | Self::Incompatible { .. }
        )
    }
}
