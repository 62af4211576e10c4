//! # relaydb core
//!
//! The durable half of relaydb: an ordered queue of caller payloads that
//! waits for a remote endpoint to acknowledge them.
//!
//! - [`RecordStore`] appends records, pages through pending ones by
//!   sequence cursor, marks acknowledged uuids stored and deletes in bulk
//! - every mutation is one or more CRC-protected frames in `queue.log`,
//!   replayed into an in-memory index on open
//! - [`Counts`] are published through `tokio::sync::watch` receivers
//!
//! ```rust
//! use relaydb_codec::Entry;
//! use relaydb_core::{RecordStore, StoreConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = RecordStore::open(dir.path(), StoreConfig::default()).unwrap();
//! store.append(Entry::new().with("steps", 1200)).unwrap();
//! assert_eq!(store.count_unsent(), 1);
//! ```

mod config;
mod counts;
mod dir;
mod error;
mod index;
pub mod log;
mod store;
mod types;

pub use config::{StoreConfig, DEFAULT_COMPACT_THRESHOLD, DEFAULT_MAX_ITEMS_PER_TRANSACTION};
pub use counts::Counts;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use store::{CompactionReport, RecordStore};
pub use types::{QueuedRecord, RecordState, SequenceId, StoreStats};

pub use relaydb_codec::{Entry, Value};
