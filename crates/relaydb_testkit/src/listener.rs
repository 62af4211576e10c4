//! Listener that records every call.

use parking_lot::Mutex;
use relaydb_sync_engine::{FailureKind, SyncError, SyncListener, SyncSuccess};

/// A failure as seen by the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    /// Classified kind.
    pub kind: FailureKind,
    /// Display text of the error.
    pub message: String,
}

/// Captures successes and failures for later assertions.
#[derive(Debug, Default)]
pub struct RecordingListener {
    successes: Mutex<Vec<SyncSuccess>>,
    failures: Mutex<Vec<RecordedFailure>>,
}

impl RecordingListener {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Successes in call order.
    pub fn successes(&self) -> Vec<SyncSuccess> {
        self.successes.lock().clone()
    }

    /// Failures in call order.
    pub fn failures(&self) -> Vec<RecordedFailure> {
        self.failures.lock().clone()
    }

    /// Number of success calls.
    pub fn success_count(&self) -> usize {
        self.successes.lock().len()
    }

    /// Number of failure calls.
    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }
}

impl SyncListener for RecordingListener {
    fn on_success(&self, success: &SyncSuccess) {
        self.successes.lock().push(*success);
    }

    fn on_failure(&self, error: &SyncError) {
        self.failures.lock().push(RecordedFailure {
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}
