//! Configuration for the relay engine.

use crate::error::{SyncError, SyncResult};
use relaydb_codec::Entry;

/// Records per upload unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Settings read by every dispatch.
///
/// The engine keeps one of these behind a lock and clones it at the start
/// of each [`dispatch`](crate::RelayEngine::dispatch), so changes made while
/// uploads are in flight apply to the next dispatch only.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Sent as `_pw`.
    pub shared_secret: String,
    /// URL each chunk is posted to.
    pub remote_endpoint: String,
    /// Sent as `_did`.
    pub device_id: String,
    /// Maximum records per upload.
    pub chunk_size: usize,
    /// Delete stored records after every successful acknowledgment.
    pub delete_after_success: bool,
    /// Extra top-level keys merged into every upload.
    pub overlay: Entry,
    /// Log request and response bodies and local counts at debug level.
    pub diagnostics: bool,
}

impl SyncConfig {
    /// Creates a configuration with default chunking and no overlay.
    pub fn new(
        remote_endpoint: impl Into<String>,
        shared_secret: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            remote_endpoint: remote_endpoint.into(),
            device_id: device_id.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            delete_after_success: false,
            overlay: Entry::new(),
            diagnostics: false,
        }
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets whether acknowledged records are deleted right away.
    #[must_use]
    pub fn with_delete_after_success(mut self, enabled: bool) -> Self {
        self.delete_after_success = enabled;
        self
    }

    /// Sets the overlay.
    #[must_use]
    pub fn with_overlay(mut self, overlay: Entry) -> Self {
        self.overlay = overlay;
        self
    }

    /// Enables or disables diagnostic logging.
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Checks the values a dispatch cannot work without.
    pub fn validate(&self) -> SyncResult<()> {
        validate_chunk_size(self.chunk_size)?;
        if self.remote_endpoint.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "remote endpoint must not be empty".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_chunk_size(chunk_size: usize) -> SyncResult<()> {
    if chunk_size == 0 {
        return Err(SyncError::InvalidConfig(
            "chunk size must be at least 1".into(),
        ));
    }
    Ok(())
}
