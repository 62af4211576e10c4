//! Result hooks.

use crate::error::SyncError;

/// What one acknowledged chunk did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSuccess {
    /// Position of the chunk within its dispatch.
    pub chunk: usize,
    /// Valid uuids the endpoint acknowledged.
    pub acknowledged: usize,
    /// Records that moved from pending to stored.
    pub transitioned: usize,
    /// Records removed by delete-after-success.
    pub deleted: usize,
    /// Endpoint total carried by the response.
    pub total_count: Option<u64>,
}

/// Receives the outcome of every chunk.
///
/// Exactly one method is called per chunk, from a tokio worker thread, in
/// whatever order responses arrive. Both methods default to doing nothing.
pub trait SyncListener: Send + Sync {
    /// A chunk was acknowledged and the store updated.
    fn on_success(&self, success: &SyncSuccess) {
        let _ = success;
    }

    /// A chunk failed. Transport and protocol failures never touch the store.
    fn on_failure(&self, error: &SyncError) {
        let _ = error;
    }
}
