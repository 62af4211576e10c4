//! Log record types and their payload encoding.

use crate::error::{CoreError, CoreResult};
use uuid::Uuid;

/// Magic bytes opening every log frame.
pub const LOG_MAGIC: [u8; 4] = *b"RLOG";

/// Current frame format version.
pub const LOG_VERSION: u16 = 1;

/// Type byte of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// A new pending record.
    Append = 1,
    /// A set of records acknowledged by the remote endpoint.
    MarkStored = 2,
    /// Removal of every stored record.
    DeleteStored = 3,
    /// Removal of every record.
    DeleteAll = 4,
    /// Sequence watermark written at the head of a compacted log.
    Checkpoint = 5,
}

impl LogRecordType {
    /// Parses a type byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Append),
            2 => Some(Self::MarkStored),
            3 => Some(Self::DeleteStored),
            4 => Some(Self::DeleteAll),
            5 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Returns the type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One committed store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A record entered the queue.
    Append {
        /// Assigned sequence id.
        sequence: u64,
        /// Assigned idempotency key.
        uuid: Uuid,
        /// Payload as JSON bytes.
        payload: Vec<u8>,
    },
    /// Records with these uuids became stored.
    MarkStored {
        /// Acknowledged uuids.
        uuids: Vec<Uuid>,
    },
    /// Every stored record was removed.
    DeleteStored,
    /// Every record was removed.
    DeleteAll,
    /// Sequence ids below `next_sequence` are spent.
    Checkpoint {
        /// First sequence id still available.
        next_sequence: u64,
    },
}

impl LogRecord {
    /// Largest payload an `Append` can carry (4-byte length field).
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Append { .. } => LogRecordType::Append,
            Self::MarkStored { .. } => LogRecordType::MarkStored,
            Self::DeleteStored => LogRecordType::DeleteStored,
            Self::DeleteAll => LogRecordType::DeleteAll,
            Self::Checkpoint { .. } => LogRecordType::Checkpoint,
        }
    }

    /// Serializes the record body (no framing).
    ///
    /// ```text
    /// Append      | sequence u64 | uuid [16] | len u32 | payload |
    /// MarkStored  | count u32 | uuid [16] * count |
    /// Checkpoint  | next_sequence u64 |
    /// DeleteStored, DeleteAll: empty
    /// ```
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Append {
                sequence,
                uuid,
                payload,
            } => {
                let len = u32::try_from(payload.len()).map_err(|_| {
                    CoreError::invalid_argument(format!(
                        "payload of {} bytes exceeds the {} byte limit",
                        payload.len(),
                        Self::MAX_PAYLOAD_SIZE
                    ))
                })?;
                buf.reserve(8 + 16 + 4 + payload.len());
                buf.extend_from_slice(&sequence.to_le_bytes());
                buf.extend_from_slice(uuid.as_bytes());
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Self::MarkStored { uuids } => {
                let count = u32::try_from(uuids.len())
                    .map_err(|_| CoreError::invalid_argument("too many uuids in one record"))?;
                buf.reserve(4 + 16 * uuids.len());
                buf.extend_from_slice(&count.to_le_bytes());
                for uuid in uuids {
                    buf.extend_from_slice(uuid.as_bytes());
                }
            }
            Self::DeleteStored | Self::DeleteAll => {}
            Self::Checkpoint { next_sequence } => {
                buf.extend_from_slice(&next_sequence.to_le_bytes());
            }
        }
        Ok(buf)
    }

    /// Parses a record body. `offset` is only used for error reporting.
    pub fn decode_payload(
        record_type: LogRecordType,
        payload: &[u8],
        offset: u64,
    ) -> CoreResult<Self> {
        let mut cursor = PayloadCursor {
            bytes: payload,
            pos: 0,
            offset,
        };
        let record = match record_type {
            LogRecordType::Append => {
                let sequence = cursor.u64()?;
                let uuid = cursor.uuid()?;
                let len = cursor.u32()? as usize;
                let payload = cursor.take(len)?.to_vec();
                Self::Append {
                    sequence,
                    uuid,
                    payload,
                }
            }
            LogRecordType::MarkStored => {
                let count = cursor.u32()? as usize;
                let mut uuids = Vec::with_capacity(count.min(payload.len() / 16));
                for _ in 0..count {
                    uuids.push(cursor.uuid()?);
                }
                Self::MarkStored { uuids }
            }
            LogRecordType::DeleteStored => Self::DeleteStored,
            LogRecordType::DeleteAll => Self::DeleteAll,
            LogRecordType::Checkpoint => Self::Checkpoint {
                next_sequence: cursor.u64()?,
            },
        };
        if cursor.pos != payload.len() {
            return Err(CoreError::log_corruption(
                offset,
                format!(
                    "{} trailing bytes after {:?} record",
                    payload.len() - cursor.pos,
                    record_type
                ),
            ));
        }
        Ok(record)
    }
}

struct PayloadCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    offset: u64,
}

impl<'a> PayloadCursor<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| CoreError::log_corruption(self.offset, "record body too short"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn uuid(&mut self) -> CoreResult<Uuid> {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(self.take(16)?);
        Ok(Uuid::from_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: LogRecord) {
        let bytes = record.encode_payload().unwrap();
        let decoded = LogRecord::decode_payload(record.record_type(), &bytes, 0).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn type_bytes_are_stable() {
        for b in 1..=5u8 {
            assert_eq!(LogRecordType::from_byte(b).unwrap().as_byte(), b);
        }
        assert_eq!(LogRecordType::from_byte(0), None);
        assert_eq!(LogRecordType::from_byte(6), None);
    }

    #[test]
    fn every_record_kind_decodes() {
        roundtrip(LogRecord::Append {
            sequence: 41,
            uuid: Uuid::new_v4(),
            payload: br#"{"k":1}"#.to_vec(),
        });
        roundtrip(LogRecord::MarkStored {
            uuids: vec![Uuid::new_v4(), Uuid::new_v4()],
        });
        roundtrip(LogRecord::MarkStored { uuids: vec![] });
        roundtrip(LogRecord::DeleteStored);
        roundtrip(LogRecord::DeleteAll);
        roundtrip(LogRecord::Checkpoint { next_sequence: 77 });
    }

    #[test]
    fn short_body_is_corruption() {
        let err = LogRecord::decode_payload(LogRecordType::Checkpoint, &[1, 2, 3], 64).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { offset: 64, .. }));
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let err = LogRecord::decode_payload(LogRecordType::DeleteAll, &[0], 0).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn mark_stored_count_larger_than_body_is_rejected() {
        let mut body = 1000u32.to_le_bytes().to_vec();
        body.extend_from_slice(&[0u8; 16]);
        assert!(LogRecord::decode_payload(LogRecordType::MarkStored, &body, 0).is_err());
    }
}
