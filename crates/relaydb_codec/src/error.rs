//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding documents.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Serialization to JSON failed.
    #[error("encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Bytes were not valid JSON, or not the expected shape.
    #[error("decoding failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A document was expected but something else was found.
    #[error("expected a JSON object, found {found}")]
    NotAnObject {
        /// Kind of value that was found instead.
        found: &'static str,
    },

    /// A decoded document did not have the required structure.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// What was wrong.
        message: String,
    },
}

impl CodecError {
    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }
}
