//! Sequential log reader used for recovery.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
use crate::log::{CRC_SIZE, HEADER_SIZE};
use relaydb_storage::StorageBackend;

/// Reads framed records front to back.
///
/// Memory use is one frame at a time. The reader stops cleanly at a torn
/// tail: a header cut short, a body cut short with nothing intact after it,
/// or a final frame whose checksum does not match. After iteration [`valid_end`](Self::valid_end)
/// is the offset just past the last intact frame.
pub struct LogReader<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogReader<'a> {
    /// Starts reading at offset 0.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            size: backend.size()?,
            backend,
            offset: 0,
            finished: false,
        })
    }

    /// Offset just past the last intact frame read so far.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Total bytes in the backend when reading started.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    fn read_frame(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        let remaining = self.size - start;
        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(start, "bad frame magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version == 0 || version > LOG_VERSION {
            return Err(CoreError::log_corruption(
                start,
                format!("unsupported frame version {version}"),
            ));
        }
        let record_type = LogRecordType::from_byte(header[6]).ok_or_else(|| {
            CoreError::log_corruption(start, format!("unknown record type {}", header[6]))
        })?;
        let body_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as u64;
        let frame_len = HEADER_SIZE as u64 + body_len + CRC_SIZE as u64;
        if frame_len > remaining {
            if self.intact_frame_follows(start)? {
                return Err(CoreError::log_corruption(
                    start,
                    format!("frame length {body_len} runs past the end of the log but intact frames follow"),
                ));
            }
            return Ok(None);
        }

        let rest = self
            .backend
            .read_at(start + HEADER_SIZE as u64, body_len as usize + CRC_SIZE)?;
        let (body, crc_bytes) = rest.split_at(body_len as usize);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(body);
        let computed = hasher.finalize();
        if stored != computed {
            if start + frame_len == self.size {
                return Ok(None);
            }
            return Err(CoreError::ChecksumMismatch {
                offset: start,
                expected: stored,
                actual: computed,
            });
        }

        let record = LogRecord::decode_payload(record_type, body, start)?;
        self.offset = start + frame_len;
        Ok(Some((start, record)))
    }
}

impl LogReader<'_> {
    /// True if a complete frame with a valid checksum starts anywhere after
    /// `start`. A torn final write leaves none behind it.
    fn intact_frame_follows(&self, start: u64) -> CoreResult<bool> {
        let from = start + 1;
        let tail = self.backend.read_at(from, (self.size - from) as usize)?;
        Ok((0..tail.len())
            .filter(|&pos| tail[pos..].starts_with(&LOG_MAGIC))
            .any(|pos| is_intact_frame(&tail[pos..])))
    }
}

/// Checks header, length and checksum of the frame at the front of `bytes`.
fn is_intact_frame(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE + CRC_SIZE || bytes[0..4] != LOG_MAGIC {
        return false;
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version == 0 || version > LOG_VERSION || LogRecordType::from_byte(bytes[6]).is_none() {
        return false;
    }
    let body_len = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]) as usize;
    let Some(end) = (HEADER_SIZE + body_len).checked_add(CRC_SIZE) else {
        return false;
    };
    if end > bytes.len() {
        return false;
    }
    let crc_at = end - CRC_SIZE;
    let stored = u32::from_le_bytes([
        bytes[crc_at],
        bytes[crc_at + 1],
        bytes[crc_at + 2],
        bytes[crc_at + 3],
    ]);
    crc32fast::hash(&bytes[..crc_at]) == stored
}

impl Iterator for LogReader<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
