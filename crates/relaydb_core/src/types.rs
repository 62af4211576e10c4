//! Record and identifier types.

use relaydb_codec::Entry;
use std::fmt;
use uuid::Uuid;

/// Local ordering key of a queued record.
///
/// Assigned by the store at append time, strictly increasing over the
/// store's lifetime and never reused, including across restarts and after
/// the record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId(pub u64);

impl SequenceId {
    /// Creates a sequence id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following sequence id.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Lifecycle state of a record as seen from outside the store.
///
/// `Pending -> Stored -> Deleted`, or `Pending -> Deleted` through a full
/// clear. No transition re-enters `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Not yet acknowledged by the remote endpoint.
    Pending,
    /// Acknowledged; kept locally until a delete removes it.
    Stored,
}

/// A caller payload plus the metadata the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRecord {
    /// Local ordering key.
    pub sequence: SequenceId,
    /// Idempotency key sent with the record.
    pub uuid: Uuid,
    /// Caller payload, untouched by the store.
    pub payload: Entry,
    /// Whether the remote endpoint has acknowledged this record.
    pub stored: bool,
}

impl QueuedRecord {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RecordState {
        if self.stored {
            RecordState::Stored
        } else {
            RecordState::Pending
        }
    }
}

/// Point-in-time figures about a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Records present, in any state.
    pub total: u64,
    /// Records still pending.
    pub unsent: u64,
    /// Records acknowledged but not yet deleted.
    pub stored: u64,
    /// Sequence id the next append will receive.
    pub next_sequence: u64,
    /// Size of the record log in bytes.
    pub log_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ordering_and_display() {
        let first = SequenceId::new(9);
        assert!(first < first.next());
        assert_eq!(first.next().as_u64(), 10);
        assert_eq!(first.to_string(), "seq:9");
    }

    #[test]
    fn state_follows_stored_flag() {
        let mut record = QueuedRecord {
            sequence: SequenceId::new(1),
            uuid: Uuid::new_v4(),
            payload: Entry::new(),
            stored: false,
        };
        assert_eq!(record.state(), RecordState::Pending);
        record.stored = true;
        assert_eq!(record.state(), RecordState::Stored);
    }
}
