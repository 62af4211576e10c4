//! In-memory view of the committed record log.

use crate::types::{QueuedRecord, SequenceId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use uuid::Uuid;

/// Live records keyed by sequence, with uuid lookup and an ordered set of
/// unsent sequences for cursor scans.
#[derive(Debug, Default)]
pub(crate) struct Index {
    records: BTreeMap<SequenceId, QueuedRecord>,
    by_uuid: HashMap<Uuid, SequenceId>,
    unsent: BTreeSet<SequenceId>,
    next_sequence: u64,
}

impl Index {
    pub(crate) fn new() -> Self {
        Self {
            next_sequence: 1,
            ..Self::default()
        }
    }

    pub(crate) fn next_sequence(&self) -> SequenceId {
        SequenceId::new(self.next_sequence)
    }

    /// Raises the sequence watermark; never lowers it.
    pub(crate) fn reserve_through(&mut self, next_sequence: u64) {
        self.next_sequence = self.next_sequence.max(next_sequence);
    }

    pub(crate) fn contains_uuid(&self, uuid: &Uuid) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    pub(crate) fn insert(&mut self, record: QueuedRecord) {
        self.reserve_through(record.sequence.as_u64() + 1);
        if !record.stored {
            self.unsent.insert(record.sequence);
        }
        self.by_uuid.insert(record.uuid, record.sequence);
        self.records.insert(record.sequence, record);
    }

    /// Uuids from `uuids` whose records exist and are still pending.
    pub(crate) fn pending_among(&self, uuids: &[Uuid]) -> Vec<Uuid> {
        let mut seen = BTreeSet::new();
        uuids
            .iter()
            .filter(|uuid| {
                self.by_uuid
                    .get(uuid)
                    .is_some_and(|seq| self.unsent.contains(seq))
            })
            .filter(|uuid| seen.insert(**uuid))
            .copied()
            .collect()
    }

    /// Flips matching pending records to stored. Returns how many changed.
    pub(crate) fn mark_stored(&mut self, uuids: &[Uuid]) -> usize {
        let mut changed = 0;
        for uuid in uuids {
            let Some(seq) = self.by_uuid.get(uuid).copied() else {
                continue;
            };
            if let Some(record) = self.records.get_mut(&seq) {
                if !record.stored {
                    record.stored = true;
                    self.unsent.remove(&seq);
                    changed += 1;
                }
            }
        }
        changed
    }

    pub(crate) fn delete_stored(&mut self) -> usize {
        let before = self.records.len();
        let by_uuid = &mut self.by_uuid;
        self.records.retain(|_, record| {
            if record.stored {
                by_uuid.remove(&record.uuid);
                false
            } else {
                true
            }
        });
        before - self.records.len()
    }

    pub(crate) fn delete_all(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        self.by_uuid.clear();
        self.unsent.clear();
        removed
    }

    pub(crate) fn range_unsent(&self, after: Option<SequenceId>, limit: usize) -> Vec<QueuedRecord> {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.unsent
            .range((lower, Bound::Unbounded))
            .take(limit)
            .filter_map(|seq| self.records.get(seq).cloned())
            .collect()
    }

    pub(crate) fn get(&self, sequence: SequenceId) -> Option<&QueuedRecord> {
        self.records.get(&sequence)
    }

    pub(crate) fn get_by_uuid(&self, uuid: &Uuid) -> Option<&QueuedRecord> {
        self.by_uuid.get(uuid).and_then(|seq| self.records.get(seq))
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &QueuedRecord> {
        self.records.values()
    }

    pub(crate) fn count_all(&self) -> u64 {
        self.records.len() as u64
    }

    pub(crate) fn count_unsent(&self) -> u64 {
        self.unsent.len() as u64
    }

    pub(crate) fn count_stored(&self) -> u64 {
        self.count_all() - self.count_unsent()
    }
}
