//! # relaydb storage
//!
//! Byte-level storage backends underneath the relaydb record log.
//!
//! A backend is an append-only byte sink with positional reads. It knows
//! nothing about log framing, records or sequence ids; the record store in
//! `relaydb_core` owns every byte it writes.
//!
//! ## Backends
//!
//! - [`InMemoryBackend`] - volatile, shareable between handles so tests can
//!   inspect or damage the bytes a store wrote
//! - [`FileBackend`] - a single file opened for read + append
//!
//! ## Example
//!
//! ```rust
//! use relaydb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let first = backend.append(b"frame-1").unwrap();
//! let second = backend.append(b"frame-2").unwrap();
//! assert_eq!((first, second), (0, 7));
//! assert_eq!(backend.read_at(second, 7).unwrap(), b"frame-2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
