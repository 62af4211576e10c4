//! # relaydb testkit
//!
//! Shared helpers for relaydb tests:
//!
//! - [`TestStore`]: in-memory or temp-dir stores with cleanup
//! - [`entry_strategy`] and friends: proptest generators for payloads
//! - [`MemoryAggregator`]: an in-process endpoint that deduplicates by `_u`
//! - [`RecordingListener`]: captures every listener call
//! - [`FaultyBackend`]: a storage backend whose writes can be made to fail
//! - [`init_tracing`]: log output for a test run, filtered by `RUST_LOG`
//!
//! ```rust
//! use relaydb_testkit::prelude::*;
//!
//! let store = TestStore::memory();
//! fill(&store, 3);
//! assert_eq!(store.count_unsent(), 3);
//! ```

pub mod aggregator;
pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod listener;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregator::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::listener::*;
    pub use crate::logging::*;
}

pub use aggregator::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use listener::*;
pub use logging::*;
