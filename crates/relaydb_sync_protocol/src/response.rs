//! Acknowledgment documents.

use crate::keys;
use relaydb_codec::{entry_from_json, to_json_vec, CodecError, CodecResult, Entry, Value};
use std::fmt;
use uuid::Uuid;

/// Outcome the endpoint reported for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckStatus {
    /// `status` was exactly `"ok"`.
    Ok,
    /// Anything else. Holds the status text, or `None` if it was missing or
    /// not a string.
    Rejected(Option<String>),
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str(keys::STATUS_OK),
            Self::Rejected(Some(status)) => write!(f, "{status:?}"),
            Self::Rejected(None) => f.write_str("<missing>"),
        }
    }
}

/// A decoded acknowledgment.
///
/// Decoding is lenient where the endpoint is known to vary:
///
/// - `stored_uuids` may be a string holding a JSON array (the usual form),
///   a literal array, or absent (nothing acknowledged)
/// - strings that are not uuids are collected in `unparsed_uuids`
/// - a missing or non-integer `total_count` decodes as `None`
///
/// For a rejected status nothing past `status` is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckResponse {
    /// Reported outcome.
    pub status: AckStatus,
    /// Acknowledged idempotency keys.
    pub stored_uuids: Vec<Uuid>,
    /// Acknowledged strings that are not valid uuids.
    pub unparsed_uuids: Vec<String>,
    /// Endpoint's total, when reported.
    pub total_count: Option<u64>,
}

impl AckResponse {
    /// A success acknowledgment.
    pub fn ok(stored_uuids: impl IntoIterator<Item = Uuid>, total_count: u64) -> Self {
        Self {
            status: AckStatus::Ok,
            stored_uuids: stored_uuids.into_iter().collect(),
            unparsed_uuids: Vec::new(),
            total_count: Some(total_count),
        }
    }

    /// A rejection carrying `status`.
    pub fn rejected(status: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Rejected(Some(status.into())),
            stored_uuids: Vec::new(),
            unparsed_uuids: Vec::new(),
            total_count: None,
        }
    }

    /// True if the endpoint accepted the upload.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }

    /// Encodes in the endpoint's form, with `stored_uuids` as a string.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut body = Entry::new();
        match &self.status {
            AckStatus::Ok => {
                body.insert(keys::STATUS, keys::STATUS_OK);
            }
            AckStatus::Rejected(Some(status)) => {
                body.insert(keys::STATUS, status.as_str());
            }
            AckStatus::Rejected(None) => {}
        }
        let uuids: Vec<String> = self
            .stored_uuids
            .iter()
            .map(Uuid::to_string)
            .chain(self.unparsed_uuids.iter().cloned())
            .collect();
        let inner = to_json_vec(&uuids)?;
        let inner = String::from_utf8(inner)
            .map_err(|_| CodecError::invalid_structure("uuid list is not UTF-8"))?;
        body.insert(keys::STORED_UUIDS, inner);
        if let Some(total) = self.total_count {
            body.insert(keys::TOTAL_COUNT, total);
        }
        to_json_vec(&body)
    }

    /// Decodes a response body.
    ///
    /// # Errors
    ///
    /// Fails if the body is not a JSON object, or an ok response carries a
    /// `stored_uuids` that is not an array of strings in either form.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let body = entry_from_json(bytes)?;
        let status = match body.get(keys::STATUS).and_then(Value::as_text) {
            Some(keys::STATUS_OK) => AckStatus::Ok,
            Some(other) => AckStatus::Rejected(Some(other.to_owned())),
            None => AckStatus::Rejected(None),
        };
        if status != AckStatus::Ok {
            return Ok(Self {
                status,
                stored_uuids: Vec::new(),
                unparsed_uuids: Vec::new(),
                total_count: None,
            });
        }

        let raw = match body.get(keys::STORED_UUIDS) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Text(encoded)) => {
                serde_json::from_str::<Vec<String>>(encoded).map_err(CodecError::Decode)?
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_text().map(str::to_owned).ok_or_else(|| {
                        CodecError::invalid_structure(format!(
                            "`stored_uuids` item is {}, expected string",
                            item.kind()
                        ))
                    })
                })
                .collect::<CodecResult<Vec<_>>>()?,
            Some(other) => {
                return Err(CodecError::invalid_structure(format!(
                    "`stored_uuids` is {}, expected string or array",
                    other.kind()
                )))
            }
        };

        let mut stored_uuids = Vec::with_capacity(raw.len());
        let mut unparsed_uuids = Vec::new();
        for text in raw {
            match Uuid::parse_str(&text) {
                Ok(uuid) => stored_uuids.push(uuid),
                Err(_) => unparsed_uuids.push(text),
            }
        }

        let total_count = body
            .get(keys::TOTAL_COUNT)
            .and_then(Value::as_integer)
            .and_then(|n| u64::try_from(n).ok());

        Ok(Self {
            status,
            stored_uuids,
            unparsed_uuids,
            total_count,
        })
    }
}
