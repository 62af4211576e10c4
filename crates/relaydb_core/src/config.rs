//! Record store configuration.

/// Default number of uuids applied per atomic `MarkStored` record.
///
/// Matches the bound-variable limit embedded SQL engines commonly impose,
/// so a store can be swapped for one without changing batch behavior.
pub const DEFAULT_MAX_ITEMS_PER_TRANSACTION: usize = 999;

/// Default log size after which deletes trigger compaction.
pub const DEFAULT_COMPACT_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Configuration for opening a [`RecordStore`](crate::RecordStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Create the store directory if it does not exist.
    pub create_if_missing: bool,

    /// Sync the log to stable storage before each mutating call returns.
    pub sync_on_write: bool,

    /// Largest uuid set written as one atomic mark-stored step.
    pub max_items_per_transaction: usize,

    /// Log size in bytes at which a delete compacts the log (0 = never).
    pub compact_threshold: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            max_items_per_transaction: DEFAULT_MAX_ITEMS_PER_TRANSACTION,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether a missing directory is created.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether each mutation is synced before returning.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the mark-stored sub-batch size. Zero is treated as one.
    #[must_use]
    pub const fn max_items_per_transaction(mut self, value: usize) -> Self {
        self.max_items_per_transaction = if value == 0 { 1 } else { value };
        self
    }

    /// Sets the automatic compaction threshold (0 disables it).
    #[must_use]
    pub const fn compact_threshold(mut self, bytes: u64) -> Self {
        self.compact_threshold = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert_eq!(config.max_items_per_transaction, 999);
        assert_eq!(config.compact_threshold, 4 * 1024 * 1024);
    }

    #[test]
    fn builder_clamps_batch_size() {
        let config = StoreConfig::new()
            .sync_on_write(false)
            .max_items_per_transaction(0)
            .compact_threshold(0);
        assert!(!config.sync_on_write);
        assert_eq!(config.max_items_per_transaction, 1);
        assert_eq!(config.compact_threshold, 0);
    }
}
