//! Chunk planning and the handle a dispatch returns.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::listener::SyncSuccess;
use relaydb_core::{QueuedRecord, RecordStore};
use relaydb_sync_protocol::{BatchRequest, WireRecord};
use tokio::task::JoinHandle;

/// One encoded upload, ready to post.
#[derive(Debug)]
pub(crate) struct PlannedChunk {
    pub(crate) index: usize,
    pub(crate) records: usize,
    pub(crate) body: Vec<u8>,
}

/// Splits the unsent records into uploads of at most `chunk_size`.
///
/// The number of chunks is fixed from `count_unsent` up front; each chunk
/// then reads the next page after the previous chunk's last sequence. A
/// record acknowledged meanwhile is simply not read, and planning stops
/// early if the queue runs dry. Records appended after the count may ride
/// along in the last chunk or wait for the next dispatch.
///
/// With nothing unsent, `send_even_if_empty` yields one probe upload with
/// an empty `_ent`.
pub(crate) fn plan_chunks(
    store: &RecordStore,
    config: &SyncConfig,
    send_even_if_empty: bool,
) -> SyncResult<Vec<PlannedChunk>> {
    let unsent = store.count_unsent();
    if unsent == 0 {
        if !send_even_if_empty {
            return Ok(Vec::new());
        }
        return Ok(vec![PlannedChunk {
            index: 0,
            records: 0,
            body: build_request(config, &[]).encode()?,
        }]);
    }

    let chunk_size = config.chunk_size.max(1);
    let chunk_count = unsent.div_ceil(chunk_size as u64) as usize;
    let mut chunks = Vec::with_capacity(chunk_count);
    let mut cursor = None;
    for index in 0..chunk_count {
        let records = store.range_unsent(cursor, chunk_size)?;
        let Some(last) = records.last() else {
            break;
        };
        cursor = Some(last.sequence);
        chunks.push(PlannedChunk {
            index,
            records: records.len(),
            body: build_request(config, &records).encode()?,
        });
    }
    Ok(chunks)
}

/// The upload for `records` under `config`.
pub(crate) fn build_request(config: &SyncConfig, records: &[QueuedRecord]) -> BatchRequest {
    BatchRequest::new(config.shared_secret.as_str(), config.device_id.as_str())
        .with_overlay(config.overlay.clone())
        .with_records(records.iter().map(|record| WireRecord {
            sequence: record.sequence.as_u64(),
            uuid: record.uuid,
            payload: &record.payload,
        }))
}

/// How one chunk ended.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Position within the dispatch.
    pub chunk: usize,
    /// Records the chunk carried.
    pub records: usize,
    /// What the listener was told.
    pub result: SyncResult<SyncSuccess>,
}

impl ChunkOutcome {
    /// True if the chunk was acknowledged and applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Report of a dispatch whose chunks are in flight.
///
/// Dropping the handle does not cancel anything; chunks always run to
/// completion and notify the listener.
#[derive(Debug)]
pub struct DispatchHandle {
    chunk_sizes: Vec<usize>,
    tasks: Vec<JoinHandle<ChunkOutcome>>,
}

impl DispatchHandle {
    pub(crate) fn new(chunk_sizes: Vec<usize>, tasks: Vec<JoinHandle<ChunkOutcome>>) -> Self {
        Self { chunk_sizes, tasks }
    }

    /// Number of uploads submitted.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_sizes.len()
    }

    /// Records per upload, in submission order.
    #[must_use]
    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    /// Records across all uploads.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.chunk_sizes.iter().sum()
    }

    /// True if nothing was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunk_sizes.is_empty()
    }

    /// Waits until every chunk's response has been processed.
    ///
    /// Outcomes are in submission order, whatever order they completed in.
    pub async fn wait(self) -> Vec<ChunkOutcome> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (chunk, (task, records)) in self.tasks.into_iter().zip(self.chunk_sizes).enumerate() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(join) => ChunkOutcome {
                    chunk,
                    records,
                    result: Err(SyncError::Interrupted(join.to_string())),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
