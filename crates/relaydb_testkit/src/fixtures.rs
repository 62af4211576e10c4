//! Store fixtures.

use relaydb_codec::Entry;
use relaydb_core::{QueuedRecord, RecordStore, StoreConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A record store that cleans up after itself.
pub struct TestStore {
    /// The store, shareable with an engine.
    pub store: Arc<RecordStore>,
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// A store held in memory.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(RecordStore::open_in_memory().expect("open in-memory store")),
            temp_dir: None,
        }
    }

    /// A store in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with(StoreConfig::default())
    }

    /// A store in a fresh temporary directory with `config`.
    pub fn file_with(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp directory");
        let store = RecordStore::open(temp_dir.path(), config).expect("open file store");
        Self {
            store: Arc::new(store),
            temp_dir: Some(temp_dir),
        }
    }

    /// Directory of a file-backed store.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes and reopens a file-backed store, keeping its directory.
    ///
    /// # Panics
    ///
    /// Panics for an in-memory store or if another `Arc` to the store is
    /// still alive.
    pub fn reopen(self) -> Self {
        let temp_dir = self.temp_dir.expect("only file stores can be reopened");
        let config = self.store.config().clone();
        assert_eq!(
            Arc::strong_count(&self.store),
            1,
            "store still shared; drop engines before reopening"
        );
        drop(self.store);
        let store = RecordStore::open(temp_dir.path(), config).expect("reopen file store");
        Self {
            store: Arc::new(store),
            temp_dir: Some(temp_dir),
        }
    }

    /// Another handle to the store.
    pub fn shared(&self) -> Arc<RecordStore> {
        Arc::clone(&self.store)
    }
}

impl std::ops::Deref for TestStore {
    type Target = RecordStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A small payload numbered `n`.
pub fn sample_entry(n: usize) -> Entry {
    Entry::new()
        .with("event", "step")
        .with("n", n as i64)
        .with("meta", Entry::new().with("source", "testkit"))
}

/// Appends `count` sample payloads.
pub fn fill(store: &RecordStore, count: usize) -> Vec<QueuedRecord> {
    (0..count)
        .map(|n| store.append(sample_entry(n)).expect("append"))
        .collect()
}
