//! # relaydb codec
//!
//! The document model for queued record payloads and its JSON encoding.
//!
//! An [`Entry`] is an ordered map of string keys to [`Value`]s. The engine
//! treats it as opaque apart from injecting its reserved keys before a
//! record goes on the wire. The same JSON encoding is used for payload bytes
//! in the local record log and for outgoing batches.
//!
//! ```
//! use relaydb_codec::{entry_from_json, to_json_vec, Entry};
//!
//! let entry = Entry::new().with("screen", "settings").with("ms", 420);
//! let bytes = to_json_vec(&entry).unwrap();
//! assert_eq!(entry_from_json(&bytes).unwrap(), entry);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entry;
mod error;
mod json;
mod value;

pub use entry::Entry;
pub use error::{CodecError, CodecResult};
pub use json::{entry_from_json, to_json_vec};
pub use value::Value;
