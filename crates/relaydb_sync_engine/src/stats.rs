//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Totals since the engine was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Calls to `dispatch` that submitted at least one chunk.
    pub dispatches: u64,
    /// Chunks handed to the transport.
    pub chunks_sent: u64,
    /// Records carried by those chunks.
    pub records_sent: u64,
    /// Chunks whose acknowledgment was applied.
    pub chunks_acknowledged: u64,
    /// Chunks that ended in a failure callback.
    pub chunks_failed: u64,
    /// Records moved to stored by acknowledgments.
    pub records_acknowledged: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    dispatches: AtomicU64,
    chunks_sent: AtomicU64,
    records_sent: AtomicU64,
    chunks_acknowledged: AtomicU64,
    chunks_failed: AtomicU64,
    records_acknowledged: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_dispatch(&self, chunk_sizes: &[usize]) {
        if chunk_sizes.is_empty() {
            return;
        }
        let records: usize = chunk_sizes.iter().sum();
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        self.chunks_sent
            .fetch_add(chunk_sizes.len() as u64, Ordering::Relaxed);
        self.records_sent.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_ack(&self, transitioned: usize) {
        self.chunks_acknowledged.fetch_add(1, Ordering::Relaxed);
        self.records_acknowledged
            .fetch_add(transitioned as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.chunks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EngineStats {
        EngineStats {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            chunks_acknowledged: self.chunks_acknowledged.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            records_acknowledged: self.records_acknowledged.load(Ordering::Relaxed),
        }
    }
}
