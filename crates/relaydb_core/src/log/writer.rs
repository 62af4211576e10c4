//! Log writer: framing, commit and recovery scan.

use crate::error::{CoreError, CoreResult};
use crate::log::reader::LogReader;
use crate::log::record::{LogRecord, LOG_MAGIC, LOG_VERSION};
use crate::log::{CRC_SIZE, HEADER_SIZE};
use relaydb_storage::StorageBackend;
use tracing::warn;

/// Builds the on-disk frame for one record.
pub fn encode_frame(record: &LogRecord) -> CoreResult<Vec<u8>> {
    let body = record.encode_payload()?;
    let mut frame = Vec::with_capacity(HEADER_SIZE + body.len() + CRC_SIZE);
    frame.extend_from_slice(&LOG_MAGIC);
    frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
    frame.push(record.record_type().as_byte());
    frame.extend_from_slice(&body_length(body.len())?.to_le_bytes());
    frame.extend_from_slice(&body);
    let crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

fn body_length(len: usize) -> CoreResult<u32> {
    u32::try_from(len).map_err(|_| {
        CoreError::invalid_argument(format!(
            "log record body of {len} bytes does not fit the frame length field"
        ))
    })
}

/// Outcome of scanning a log on open.
#[derive(Debug, Default)]
pub struct Replay {
    /// Intact records in log order.
    pub records: Vec<LogRecord>,
    /// Bytes cut off the end because the last frame was torn.
    pub discarded_bytes: u64,
}

/// Owns the backend of a record log.
///
/// Every call to [`commit`](Self::commit) writes exactly one frame. If the
/// write or the following sync fails, the backend is cut back to its
/// previous size so a half-written frame never precedes later ones.
pub struct LogWriter {
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
}

impl LogWriter {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
        }
    }

    /// Appends one record and makes it durable. Returns its offset.
    pub fn commit(&mut self, record: &LogRecord) -> CoreResult<u64> {
        let frame = encode_frame(record)?;
        self.write_frames(&frame)
    }

    /// Appends pre-built frames as one write.
    pub fn write_frames(&mut self, frames: &[u8]) -> CoreResult<u64> {
        let before = self.backend.size()?;
        let result = self.backend.append(frames).and_then(|offset| {
            if self.sync_on_write {
                self.backend.sync()?;
            } else {
                self.backend.flush()?;
            }
            Ok(offset)
        });
        match result {
            Ok(offset) => Ok(offset),
            Err(err) => {
                if let Ok(after) = self.backend.size() {
                    if after > before {
                        if let Err(cut) = self.backend.truncate(before) {
                            warn!(error = %cut, offset = before, "could not roll back partial log write");
                        }
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Reads every intact record and drops a torn tail.
    pub fn replay(&mut self) -> CoreResult<Replay> {
        let mut reader = LogReader::new(self.backend.as_ref())?;
        let mut records = Vec::new();
        for item in reader.by_ref() {
            let (_, record) = item?;
            records.push(record);
        }
        let valid_end = reader.valid_end();
        let size = reader.size();
        let mut replay = Replay {
            records,
            discarded_bytes: 0,
        };
        if valid_end < size {
            replay.discarded_bytes = size - valid_end;
            warn!(
                valid_end,
                discarded = replay.discarded_bytes,
                "discarding torn record at end of log"
            );
            self.backend.truncate(valid_end)?;
        }
        Ok(replay)
    }

    /// Current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Clears the log and writes `frames` as its new content.
    ///
    /// Only used for backends with no file to rename over; not crash safe.
    pub fn rewrite_in_place(&mut self, frames: &[u8]) -> CoreResult<()> {
        self.backend.truncate(0)?;
        self.backend.append(frames)?;
        self.backend.sync()?;
        Ok(())
    }

    /// Swaps in a new backend, e.g. after a compacted file was renamed in.
    pub fn replace_backend(&mut self, backend: Box<dyn StorageBackend>) {
        self.backend = backend;
    }
}
