//! # relaydb sync engine
//!
//! Uploads queued records to an aggregation endpoint and reconciles the
//! local store with its acknowledgments.
//!
//! ## Flow
//!
//! 1. [`RelayEngine::append`] queues a payload in the [`RecordStore`]
//! 2. [`RelayEngine::dispatch`] splits the unsent records into chunks of
//!    `chunk_size`, in sequence order, and posts them all without waiting
//! 3. each response is decoded on its own: `"ok"` marks the listed uuids
//!    stored (and optionally deletes stored records), updates the remote
//!    count and calls [`SyncListener::on_success`]; anything else calls
//!    [`SyncListener::on_failure`] and leaves the store untouched
//!
//! ## Guarantees
//!
//! - Delivery is at least once. The endpoint deduplicates by `_u`.
//! - Chunks may be acknowledged in any order; marking is idempotent.
//! - There is no retry. Unsent records wait for the next `dispatch`.
//!
//! [`RecordStore`]: relaydb_core::RecordStore

mod ack;
mod config;
mod dispatch;
mod engine;
mod error;
mod http;
mod listener;
mod stats;

pub use config::{SyncConfig, DEFAULT_CHUNK_SIZE};
pub use dispatch::{ChunkOutcome, DispatchHandle};
pub use engine::RelayEngine;
pub use error::{FailureKind, SyncError, SyncResult};
pub use http::{HttpClient, LoopbackClient, LoopbackServer, TransportFailure};
pub use listener::{SyncListener, SyncSuccess};
pub use stats::EngineStats;
