//! Error types for the relay engine.

use crate::http::TransportFailure;
use relaydb_codec::CodecError;
use relaydb_core::CoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Broad class of a [`SyncError`], for listeners that only branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The local store could not complete an operation.
    Persistence,
    /// No response was received.
    Transport,
    /// A response was received but not accepted.
    Protocol,
    /// The engine was misconfigured or used outside a runtime.
    Config,
}

/// Errors surfaced by the engine, either returned or passed to
/// [`SyncListener::on_failure`](crate::SyncListener::on_failure).
#[derive(Error, Debug)]
pub enum SyncError {
    /// A store operation failed.
    #[error("persistence fault: {0}")]
    Persistence(#[from] CoreError),

    /// Store work was cut short before it reported back.
    #[error("store task interrupted: {0}")]
    Interrupted(String),

    /// The transport failed to deliver a request or return a response.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportFailure),

    /// The endpoint answered with a non-ok status or an unreadable body.
    #[error("protocol error: {message}")]
    Protocol {
        /// What was wrong with the response.
        message: String,
    },

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `dispatch` was called outside a tokio runtime.
    #[error("no tokio runtime to dispatch on")]
    NoRuntime,
}

impl SyncError {
    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Persistence(_) | Self::Interrupted(_) => FailureKind::Persistence,
            Self::Transport(_) => FailureKind::Transport,
            Self::Protocol { .. } => FailureKind::Protocol,
            Self::InvalidConfig(_) | Self::NoRuntime => FailureKind::Config,
        }
    }
}

impl From<CodecError> for SyncError {
    fn from(err: CodecError) -> Self {
        Self::protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            SyncError::Persistence(CoreError::StoreLocked).kind(),
            FailureKind::Persistence
        );
        assert_eq!(
            SyncError::from(TransportFailure::new("connection reset")).kind(),
            FailureKind::Transport
        );
        assert_eq!(
            SyncError::protocol("non-ok status").kind(),
            FailureKind::Protocol
        );
        assert_eq!(SyncError::NoRuntime.kind(), FailureKind::Config);
    }

    #[test]
    fn codec_errors_are_protocol_errors() {
        let err = SyncError::from(CodecError::invalid_structure("missing `_ent`"));
        assert_eq!(err.kind(), FailureKind::Protocol);
        assert_eq!(
            err.to_string(),
            "protocol error: invalid structure: missing `_ent`"
        );
    }

    #[test]
    fn transport_display_carries_status() {
        let err = SyncError::from(TransportFailure::with_status(503, "unavailable"));
        assert_eq!(err.to_string(), "transport failure: HTTP 503: unavailable");
    }
}
