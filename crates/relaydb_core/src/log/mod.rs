//! The record log.
//!
//! Every committed store mutation is one frame:
//!
//! ```text
//! | magic "RLOG" (4) | version (2) | type (1) | length (4) | body (N) | crc32 (4) |
//! ```
//!
//! The CRC covers header and body. A frame is the unit of atomicity: after a
//! crash a mutation is either fully present or absent.
//!
//! ## Recovery policy
//!
//! Tolerated, treated as end of log and truncated away:
//! - fewer than 11 bytes left for a header
//! - a body or checksum that runs past the end of the log, with no intact
//!   frame anywhere after it
//! - a checksum mismatch on the final frame
//!
//! Fatal, the store refuses to open:
//! - bad magic, unknown version or record type
//! - a checksum mismatch on any frame that is not the last
//! - a length that runs past the end of the log while intact frames follow
//! - a body that does not parse

mod reader;
mod record;
mod writer;

pub use reader::LogReader;
pub use record::{LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use writer::{encode_frame, LogWriter, Replay};

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;
