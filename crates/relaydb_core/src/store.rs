//! The record store.

use crate::config::StoreConfig;
use crate::counts::{CountObservers, Counts};
use crate::dir::StoreDir;
use crate::error::CoreResult;
use crate::index::Index;
use crate::log::{encode_frame, LogRecord, LogWriter};
use crate::types::{QueuedRecord, SequenceId, StoreStats};
use parking_lot::{Mutex, RwLock};
use relaydb_codec::{entry_from_json, to_json_vec, Entry};
use relaydb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::Path;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Result of a compaction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Log size before the rewrite.
    pub bytes_before: u64,
    /// Log size after the rewrite.
    pub bytes_after: u64,
    /// Records carried into the new log.
    pub live_records: u64,
}

/// Durable, ordered queue of records awaiting acknowledgment.
///
/// All mutations (`append`, `mark_stored`, `delete_stored`, `delete_all`,
/// `compact`) are serialized through one writer lock and each commits one or
/// more log frames before the in-memory index changes. Reads take a shared
/// lock on the index and see a consistent snapshot per call.
///
/// ```rust
/// use relaydb_codec::Entry;
/// use relaydb_core::RecordStore;
///
/// let store = RecordStore::open_in_memory().unwrap();
/// let first = store.append(Entry::new().with("event", "tap")).unwrap();
/// let page = store.range_unsent(None, 10).unwrap();
/// assert_eq!(page[0].uuid, first.uuid);
///
/// store.mark_stored(&[first.uuid]).unwrap();
/// assert_eq!(store.count_unsent(), 0);
/// assert_eq!(store.delete_stored().unwrap(), 1);
/// ```
pub struct RecordStore {
    config: StoreConfig,
    dir: Option<StoreDir>,
    writer: Mutex<WriterState>,
    index: RwLock<Index>,
    counts: CountObservers,
}

struct WriterState {
    log: LogWriter,
    /// Log size right after the last compaction (or open).
    compacted_size: u64,
}

impl RecordStore {
    /// Opens the store in directory `path`, replaying its log.
    ///
    /// # Errors
    ///
    /// Fails if the directory is locked by another handle, cannot be created,
    /// or holds a log damaged before its final frame.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Self> {
        let dir = StoreDir::open(path.as_ref(), config.create_if_missing)?;
        if dir.remove_stale_temp()? {
            warn!(path = %dir.path().display(), "removed leftover compaction file");
        }
        let backend = FileBackend::open(&dir.log_path())?;
        Self::assemble(Box::new(backend), config, Some(dir))
    }

    /// Opens a store that lives only in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }

    /// Opens a store over an arbitrary backend, replaying whatever it holds.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
    ) -> CoreResult<Self> {
        Self::assemble(backend, config, None)
    }

    fn assemble(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let mut log = LogWriter::new(backend, config.sync_on_write);
        let replay = log.replay()?;
        let mut index = Index::new();
        let frames = replay.records.len();
        for record in replay.records {
            apply_replayed(&mut index, record)?;
        }
        let log_size = log.size()?;
        let counts = counts_of(&index);
        info!(
            frames,
            records = counts.all,
            unsent = counts.unsent,
            next_sequence = index.next_sequence().as_u64(),
            log_size,
            discarded = replay.discarded_bytes,
            "record store opened"
        );

        Ok(Self {
            config,
            dir,
            writer: Mutex::new(WriterState {
                log,
                compacted_size: log_size,
            }),
            index: RwLock::new(index),
            counts: CountObservers::new(counts),
        })
    }

    /// Configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Directory of a file-backed store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(StoreDir::path)
    }

    /// Queues a payload, assigning the next sequence id and a fresh uuid.
    ///
    /// The record is durable when this returns (synced if
    /// [`StoreConfig::sync_on_write`] is set).
    pub fn append(&self, payload: Entry) -> CoreResult<QueuedRecord> {
        let encoded = to_json_vec(&payload)?;
        let mut writer = self.writer.lock();
        let (sequence, uuid) = {
            let index = self.index.read();
            let mut uuid = Uuid::new_v4();
            while index.contains_uuid(&uuid) {
                uuid = Uuid::new_v4();
            }
            (index.next_sequence(), uuid)
        };

        writer.log.commit(&LogRecord::Append {
            sequence: sequence.as_u64(),
            uuid,
            payload: encoded,
        })?;

        let record = QueuedRecord {
            sequence,
            uuid,
            payload,
            stored: false,
        };
        let counts = {
            let mut index = self.index.write();
            index.insert(record.clone());
            counts_of(&index)
        };
        self.counts.publish(counts);
        drop(writer);

        trace!(%sequence, %uuid, "record appended");
        Ok(record)
    }

    /// Up to `limit` pending records with sequence greater than `after`,
    /// ascending.
    ///
    /// Pagination is keyed by sequence: pass the last sequence of one page as
    /// `after` for the next, and concurrent appends or acknowledgments never
    /// cause a skip or a repeat.
    pub fn range_unsent(
        &self,
        after: Option<SequenceId>,
        limit: usize,
    ) -> CoreResult<Vec<QueuedRecord>> {
        Ok(self.index.read().range_unsent(after, limit))
    }

    /// Marks the records with these uuids as stored.
    ///
    /// Unknown and already stored uuids are ignored. The set is applied in
    /// sub-batches of [`StoreConfig::max_items_per_transaction`], each one
    /// log frame; a crash mid-call may leave earlier sub-batches applied,
    /// which a repeat of the call completes.
    ///
    /// Returns how many records moved from pending to stored.
    pub fn mark_stored(&self, uuids: &[Uuid]) -> CoreResult<usize> {
        let mut transitioned = 0;
        for batch in uuids.chunks(self.config.max_items_per_transaction.max(1)) {
            let mut writer = self.writer.lock();
            let pending = self.index.read().pending_among(batch);
            if pending.is_empty() {
                continue;
            }
            writer.log.commit(&LogRecord::MarkStored {
                uuids: pending.clone(),
            })?;
            let counts = {
                let mut index = self.index.write();
                transitioned += index.mark_stored(&pending);
                counts_of(&index)
            };
            self.counts.publish(counts);
        }
        debug!(requested = uuids.len(), transitioned, "records marked stored");
        Ok(transitioned)
    }

    /// Removes every stored record. Pending records are untouched.
    ///
    /// Returns the number removed.
    pub fn delete_stored(&self) -> CoreResult<usize> {
        self.bulk_delete(LogRecord::DeleteStored, Index::delete_stored)
    }

    /// Removes every record regardless of state.
    ///
    /// Returns the number removed.
    pub fn delete_all(&self) -> CoreResult<usize> {
        self.bulk_delete(LogRecord::DeleteAll, Index::delete_all)
    }

    fn bulk_delete(
        &self,
        record: LogRecord,
        apply: fn(&mut Index) -> usize,
    ) -> CoreResult<usize> {
        let mut writer = self.writer.lock();
        let affected = {
            let index = self.index.read();
            match record {
                LogRecord::DeleteStored => index.count_stored(),
                _ => index.count_all(),
            }
        };
        if affected == 0 {
            return Ok(0);
        }
        writer.log.commit(&record)?;
        let (removed, counts) = {
            let mut index = self.index.write();
            let removed = apply(&mut index);
            (removed, counts_of(&index))
        };
        self.counts.publish(counts);
        debug!(kind = ?record.record_type(), removed, "records deleted");

        if self.compaction_due(&writer)? {
            if let Err(err) = self.compact_locked(&mut writer) {
                warn!(error = %err, "automatic compaction failed; log left as is");
            }
        }
        Ok(removed)
    }

    fn compaction_due(&self, writer: &WriterState) -> CoreResult<bool> {
        let threshold = self.config.compact_threshold;
        if threshold == 0 {
            return Ok(false);
        }
        let size = writer.log.size()?;
        Ok(size >= threshold && size >= writer.compacted_size.saturating_mul(2))
    }

    /// Rewrites the log so it holds only live records.
    ///
    /// The new log starts with a checkpoint of the next sequence id, so ids of
    /// deleted records stay spent. A file-backed store writes the new log
    /// beside the old one and renames it into place.
    pub fn compact(&self) -> CoreResult<CompactionReport> {
        let mut writer = self.writer.lock();
        self.compact_locked(&mut writer)
    }

    fn compact_locked(&self, writer: &mut WriterState) -> CoreResult<CompactionReport> {
        let bytes_before = writer.log.size()?;
        let (frames, live_records) = {
            let index = self.index.read();
            (snapshot_frames(&index)?, index.count_all())
        };

        let installed_in = match &self.dir {
            Some(dir) => {
                dir.remove_stale_temp()?;
                let mut fresh = FileBackend::open(&dir.compact_temp_path())?;
                fresh.append(&frames)?;
                fresh.sync()?;
                dir.install_compacted()?;
                // the handle follows the renamed file; the old inode is unlinked
                writer.log.replace_backend(Box::new(fresh));
                Some(dir)
            }
            None => {
                writer.log.rewrite_in_place(&frames)?;
                None
            }
        };

        let bytes_after = writer.log.size()?;
        writer.compacted_size = bytes_after;
        if let Some(dir) = installed_in {
            dir.sync_directory()?;
        }
        info!(bytes_before, bytes_after, live_records, "record log compacted");
        Ok(CompactionReport {
            bytes_before,
            bytes_after,
            live_records,
        })
    }

    /// Number of records present, in any state.
    #[must_use]
    pub fn count_all(&self) -> u64 {
        self.index.read().count_all()
    }

    /// Number of pending records.
    #[must_use]
    pub fn count_unsent(&self) -> u64 {
        self.index.read().count_unsent()
    }

    /// Both counts from one snapshot.
    #[must_use]
    pub fn counts(&self) -> Counts {
        counts_of(&self.index.read())
    }

    /// Watches [`count_all`](Self::count_all).
    #[must_use]
    pub fn observe_count_all(&self) -> watch::Receiver<u64> {
        self.counts.subscribe_all()
    }

    /// Watches [`count_unsent`](Self::count_unsent).
    #[must_use]
    pub fn observe_count_unsent(&self) -> watch::Receiver<u64> {
        self.counts.subscribe_unsent()
    }

    /// Watches both counts as one value.
    #[must_use]
    pub fn observe_counts(&self) -> watch::Receiver<Counts> {
        self.counts.subscribe_both()
    }

    /// Looks up a record by sequence id.
    #[must_use]
    pub fn get(&self, sequence: SequenceId) -> Option<QueuedRecord> {
        self.index.read().get(sequence).cloned()
    }

    /// Looks up a record by uuid.
    #[must_use]
    pub fn get_by_uuid(&self, uuid: &Uuid) -> Option<QueuedRecord> {
        self.index.read().get_by_uuid(uuid).cloned()
    }

    /// Current figures, including the log size.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let writer = self.writer.lock();
        let index = self.index.read();
        Ok(StoreStats {
            total: index.count_all(),
            unsent: index.count_unsent(),
            stored: index.count_stored(),
            next_sequence: index.next_sequence().as_u64(),
            log_size: writer.log.size()?,
        })
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.path())
            .field("counts", &self.counts())
            .finish_non_exhaustive()
    }
}

fn counts_of(index: &Index) -> Counts {
    Counts {
        all: index.count_all(),
        unsent: index.count_unsent(),
    }
}

fn apply_replayed(index: &mut Index, record: LogRecord) -> CoreResult<()> {
    match record {
        LogRecord::Append {
            sequence,
            uuid,
            payload,
        } => {
            index.insert(QueuedRecord {
                sequence: SequenceId::new(sequence),
                uuid,
                payload: entry_from_json(&payload)?,
                stored: false,
            });
        }
        LogRecord::MarkStored { uuids } => {
            index.mark_stored(&uuids);
        }
        LogRecord::DeleteStored => {
            index.delete_stored();
        }
        LogRecord::DeleteAll => {
            index.delete_all();
        }
        LogRecord::Checkpoint { next_sequence } => index.reserve_through(next_sequence),
    }
    Ok(())
}

/// Frames that rebuild `index` from nothing.
fn snapshot_frames(index: &Index) -> CoreResult<Vec<u8>> {
    let mut frames = encode_frame(&LogRecord::Checkpoint {
        next_sequence: index.next_sequence().as_u64(),
    })?;
    let mut stored = Vec::new();
    for record in index.records() {
        frames.extend_from_slice(&encode_frame(&LogRecord::Append {
            sequence: record.sequence.as_u64(),
            uuid: record.uuid,
            payload: to_json_vec(&record.payload)?,
        })?);
        if record.stored {
            stored.push(record.uuid);
        }
    }
    if !stored.is_empty() {
        frames.extend_from_slice(&encode_frame(&LogRecord::MarkStored { uuids: stored })?);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use tempfile::tempdir;

    fn entry(n: i64) -> Entry {
        Entry::new().with("n", n)
    }

    fn fill(store: &RecordStore, count: i64) -> Vec<QueuedRecord> {
        (0..count).map(|n| store.append(entry(n)).unwrap()).collect()
    }

    #[test]
    fn append_assigns_increasing_sequences_and_unique_uuids() {
        let store = RecordStore::open_in_memory().unwrap();
        let records = fill(&store, 5);
        for pair in records.windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
            assert_ne!(pair[0].uuid, pair[1].uuid);
        }
        assert!(records.iter().all(|r| !r.stored));
        assert_eq!(store.count_all(), 5);
        assert_eq!(store.count_unsent(), 5);
    }

    #[test]
    fn payload_is_kept_verbatim() {
        let store = RecordStore::open_in_memory().unwrap();
        let payload = Entry::new().with("_s", "caller").with("x", 1.5);
        let record = store.append(payload.clone()).unwrap();
        assert_eq!(store.get(record.sequence).unwrap().payload, payload);
    }

    #[test]
    fn range_unsent_pages_by_cursor() {
        let store = RecordStore::open_in_memory().unwrap();
        let records = fill(&store, 7);
        let first = store.range_unsent(None, 3).unwrap();
        assert_eq!(first.len(), 3);
        let cursor = first.last().map(|r| r.sequence);
        store.append(entry(99)).unwrap();
        store.mark_stored(&[records[3].uuid]).unwrap();

        let second = store.range_unsent(cursor, 10).unwrap();
        let sequences: Vec<_> = second.iter().map(|r| r.sequence.as_u64()).collect();
        assert_eq!(sequences, vec![5, 6, 7, 8]);
    }

    #[test]
    fn mark_stored_ignores_unknown_and_repeats() {
        let store = RecordStore::open_in_memory().unwrap();
        let records = fill(&store, 3);
        let uuids = [records[0].uuid, Uuid::new_v4(), records[0].uuid];
        assert_eq!(store.mark_stored(&uuids).unwrap(), 1);
        assert_eq!(store.mark_stored(&uuids).unwrap(), 0);
        assert_eq!(store.count_unsent(), 2);
        assert!(store.get_by_uuid(&records[0].uuid).unwrap().stored);
    }

    #[test]
    fn mark_stored_splits_into_sub_batches() {
        let backend = InMemoryBackend::new();
        let config = StoreConfig::new().max_items_per_transaction(2);
        let store = RecordStore::open_with_backend(Box::new(backend.clone()), config).unwrap();
        let records = fill(&store, 5);
        let size_before = backend.size().unwrap();
        let uuids: Vec<_> = records.iter().map(|r| r.uuid).collect();
        assert_eq!(store.mark_stored(&uuids).unwrap(), 5);

        // three MarkStored frames: 2 + 2 + 1 uuids
        let frame_overhead = 11 + 4 + 4;
        let expected = 3 * frame_overhead + 5 * 16;
        assert_eq!(backend.size().unwrap() - size_before, expected as u64);
    }

    #[test]
    fn delete_stored_leaves_pending() {
        let store = RecordStore::open_in_memory().unwrap();
        let records = fill(&store, 4);
        store.mark_stored(&[records[1].uuid, records[2].uuid]).unwrap();
        assert_eq!(store.delete_stored().unwrap(), 2);
        assert_eq!(store.count_all(), 2);
        assert_eq!(store.count_unsent(), 2);
        assert!(store.get(records[0].sequence).is_some());
        assert!(store.get(records[1].sequence).is_none());
    }

    #[test]
    fn delete_on_empty_store_writes_nothing() {
        let backend = InMemoryBackend::new();
        let store =
            RecordStore::open_with_backend(Box::new(backend.clone()), StoreConfig::new()).unwrap();
        assert_eq!(store.delete_all().unwrap(), 0);
        assert_eq!(store.delete_stored().unwrap(), 0);
        assert_eq!(backend.size().unwrap(), 0);
    }

    #[test]
    fn sequences_survive_delete_all_and_reopen() {
        let backend = InMemoryBackend::new();
        {
            let store =
                RecordStore::open_with_backend(Box::new(backend.clone()), StoreConfig::new())
                    .unwrap();
            fill(&store, 3);
            store.delete_all().unwrap();
            store.compact().unwrap();
        }
        let store = RecordStore::open_with_backend(Box::new(backend), StoreConfig::new()).unwrap();
        assert_eq!(store.count_all(), 0);
        assert_eq!(store.append(entry(0)).unwrap().sequence, SequenceId::new(4));
    }

    #[test]
    fn observers_follow_mutations() {
        let store = RecordStore::open_in_memory().unwrap();
        let all = store.observe_count_all();
        let unsent = store.observe_count_unsent();
        let records = fill(&store, 3);
        assert_eq!((*all.borrow(), *unsent.borrow()), (3, 3));
        store.mark_stored(&[records[0].uuid]).unwrap();
        assert_eq!((*all.borrow(), *unsent.borrow()), (3, 2));
        store.delete_stored().unwrap();
        assert_eq!((*all.borrow(), *unsent.borrow()), (2, 2));

        let late = store.observe_counts();
        assert_eq!(*late.borrow(), Counts { all: 2, unsent: 2 });
    }

    #[test]
    fn compaction_preserves_state() {
        let temp = tempdir().unwrap();
        let records;
        {
            let store = RecordStore::open(temp.path(), StoreConfig::new()).unwrap();
            records = fill(&store, 6);
            store.mark_stored(&[records[0].uuid, records[4].uuid]).unwrap();
            store.delete_stored().unwrap();
            store.mark_stored(&[records[1].uuid]).unwrap();
            let report = store.compact().unwrap();
            assert!(report.bytes_after < report.bytes_before);
            assert_eq!(report.live_records, 4);
            // writes after compaction land in the new file
            store.append(entry(6)).unwrap();
        }
        let store = RecordStore::open(temp.path(), StoreConfig::new()).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.unsent, 4);
        assert_eq!(stats.next_sequence, 8);
        assert!(store.get_by_uuid(&records[1].uuid).unwrap().stored);
    }

    #[test]
    fn automatic_compaction_after_delete() {
        let temp = tempdir().unwrap();
        let config = StoreConfig::new().sync_on_write(false).compact_threshold(512);
        let store = RecordStore::open(temp.path(), config).unwrap();
        let records = fill(&store, 40);
        let uuids: Vec<_> = records.iter().map(|r| r.uuid).collect();
        store.mark_stored(&uuids).unwrap();
        store.delete_stored().unwrap();
        // only the checkpoint frame remains
        assert_eq!(store.stats().unwrap().log_size, 11 + 8 + 4);
    }

    #[test]
    fn second_handle_on_directory_is_refused() {
        let temp = tempdir().unwrap();
        let _store = RecordStore::open(temp.path(), StoreConfig::new()).unwrap();
        let err = RecordStore::open(temp.path(), StoreConfig::new()).unwrap_err();
        assert!(matches!(err, CoreError::StoreLocked));
    }
}
