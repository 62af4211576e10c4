//! Upload documents.

use crate::keys;
use relaydb_codec::{entry_from_json, to_json_vec, CodecError, CodecResult, Entry, Value};
use uuid::Uuid;

/// A queued record as it is placed in `_ent`.
#[derive(Debug, Clone, Copy)]
pub struct WireRecord<'a> {
    /// Local sequence id, sent as `_s`.
    pub sequence: u64,
    /// Idempotency key, sent as `_u`.
    pub uuid: Uuid,
    /// Caller payload.
    pub payload: &'a Entry,
}

impl WireRecord<'_> {
    /// The payload with `_s` and `_u` set, replacing caller values.
    #[must_use]
    pub fn to_entry(&self) -> Entry {
        let mut entry = self.payload.clone();
        entry.insert(keys::SEQUENCE, self.sequence);
        entry.insert(keys::UUID, self.uuid.to_string());
        entry
    }
}

/// One chunk upload.
///
/// ```rust
/// use relaydb_codec::Entry;
/// use relaydb_sync_protocol::{BatchRequest, WireRecord};
///
/// let payload = Entry::new().with("steps", 10);
/// let request = BatchRequest::new("secret", "device-1")
///     .with_overlay(Entry::new().with("app", "demo"))
///     .with_records([WireRecord { sequence: 1, uuid: uuid::Uuid::nil(), payload: &payload }]);
///
/// let body = String::from_utf8(request.encode().unwrap()).unwrap();
/// assert!(body.starts_with(r#"{"_pw":"secret","_did":"device-1","_ent":[{"steps":10,"_s":1"#));
/// assert!(body.ends_with(r#""app":"demo"}"#));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchRequest {
    /// Value of `_pw`.
    pub shared_secret: String,
    /// Value of `_did`.
    pub device_id: String,
    /// Records with reserved keys already applied.
    pub records: Vec<Entry>,
    /// Extra top-level keys. Reserved names are dropped on encode.
    pub overlay: Entry,
}

impl BatchRequest {
    /// Creates an upload with no records and no overlay.
    pub fn new(shared_secret: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            shared_secret: shared_secret.into(),
            device_id: device_id.into(),
            records: Vec::new(),
            overlay: Entry::new(),
        }
    }

    /// Sets the overlay.
    #[must_use]
    pub fn with_overlay(mut self, overlay: Entry) -> Self {
        self.overlay = overlay;
        self
    }

    /// Appends records in the given order.
    #[must_use]
    pub fn with_records<'a>(mut self, records: impl IntoIterator<Item = WireRecord<'a>>) -> Self {
        self.records.extend(records.into_iter().map(|r| r.to_entry()));
        self
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True for a probe upload with no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The `_u` of every record that has a textual one.
    pub fn uuids(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter_map(|record| record.get(keys::UUID).and_then(Value::as_text))
    }

    /// Builds the top-level document: reserved keys first, then overlay keys
    /// that do not collide with them.
    #[must_use]
    pub fn to_entry(&self) -> Entry {
        let mut body = Entry::with_capacity(3 + self.overlay.len());
        body.insert(keys::SHARED_SECRET, self.shared_secret.as_str());
        body.insert(keys::DEVICE_ID, self.device_id.as_str());
        body.insert(
            keys::RECORDS,
            Value::Array(self.records.iter().cloned().map(Value::Object).collect()),
        );
        for (key, value) in self.overlay.iter() {
            if !keys::BATCH_RESERVED.contains(&key) {
                body.insert(key, value.clone());
            }
        }
        body
    }

    /// Encodes the upload body.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        to_json_vec(&self.to_entry())
    }

    /// Parses an upload body, as an endpoint would.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, or when `_pw`/`_did` are not strings or
    /// `_ent` is not an array of objects.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut body = entry_from_json(bytes)?;
        let shared_secret = take_text(&mut body, keys::SHARED_SECRET)?;
        let device_id = take_text(&mut body, keys::DEVICE_ID)?;
        let records = match body.remove(keys::RECORDS) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(CodecError::invalid_structure(format!(
                        "`_ent` item is {}, expected object",
                        other.kind()
                    ))),
                })
                .collect::<CodecResult<Vec<_>>>()?,
            Some(other) => {
                return Err(CodecError::invalid_structure(format!(
                    "`_ent` is {}, expected array",
                    other.kind()
                )))
            }
            None => return Err(CodecError::invalid_structure("missing `_ent`")),
        };
        Ok(Self {
            shared_secret,
            device_id,
            records,
            overlay: body,
        })
    }
}

fn take_text(body: &mut Entry, key: &str) -> CodecResult<String> {
    match body.remove(key) {
        Some(Value::Text(text)) => Ok(text),
        Some(other) => Err(CodecError::invalid_structure(format!(
            "`{key}` is {}, expected string",
            other.kind()
        ))),
        None => Err(CodecError::invalid_structure(format!("missing `{key}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body_json(request: &BatchRequest) -> serde_json::Value {
        serde_json::from_slice(&request.encode().unwrap()).unwrap()
    }

    #[test]
    fn reserved_record_keys_replace_payload_values() {
        let payload = Entry::new()
            .with("_s", "mine")
            .with("_u", 7)
            .with("steps", 3);
        let uuid = Uuid::new_v4();
        let request = BatchRequest::new("pw", "dev").with_records([WireRecord {
            sequence: 12,
            uuid,
            payload: &payload,
        }]);
        assert_eq!(
            body_json(&request)["_ent"][0],
            json!({"_s": 12, "_u": uuid.to_string(), "steps": 3})
        );
    }

    #[test]
    fn overlay_cannot_override_reserved_keys() {
        let overlay = Entry::new()
            .with("_pw", "stolen")
            .with("_ent", "nothing")
            .with("tz", "UTC");
        let request = BatchRequest::new("pw", "dev").with_overlay(overlay);
        assert_eq!(
            body_json(&request),
            json!({"_pw": "pw", "_did": "dev", "_ent": [], "tz": "UTC"})
        );
    }

    #[test]
    fn overlay_values_pass_through_unmodified() {
        let overlay = Entry::new()
            .with("nested", Entry::new().with("a", vec![1i64, 2]))
            .with("ratio", 0.25)
            .with("flag", false);
        let request = BatchRequest::new("pw", "dev").with_overlay(overlay.clone());
        let decoded = BatchRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded.overlay, overlay);
    }

    #[test]
    fn decode_reads_back_records_in_order() {
        let payloads: Vec<_> = (0..3).map(|n| Entry::new().with("n", n as i64)).collect();
        let uuids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        let request = BatchRequest::new("pw", "dev").with_records(
            payloads.iter().zip(&uuids).enumerate().map(|(n, (payload, uuid))| WireRecord {
                sequence: n as u64 + 1,
                uuid: *uuid,
                payload,
            }),
        );
        let decoded = BatchRequest::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
        let expected: Vec<String> = uuids.iter().map(Uuid::to_string).collect();
        assert_eq!(decoded.uuids().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn decode_rejects_bad_shapes() {
        let bodies: [&[u8]; 5] = [
            br#"{"_did":"d","_ent":[]}"#,
            br#"{"_pw":1,"_did":"d","_ent":[]}"#,
            br#"{"_pw":"p","_did":"d","_ent":{}}"#,
            br#"{"_pw":"p","_did":"d","_ent":[1]}"#,
            br#"[]"#,
        ];
        for body in bodies {
            assert!(BatchRequest::decode(body).is_err(), "{}", String::from_utf8_lossy(body));
        }
    }

    proptest::proptest! {
        #[test]
        fn reserved_keys_lead_and_win(
            overlay_keys in proptest::collection::vec("_?(pw|did|ent|[a-z]{1,6})", 0..10)
        ) {
            let mut overlay = Entry::new();
            for key in &overlay_keys {
                overlay.insert(key.as_str(), "overlay");
            }
            let body = BatchRequest::new("pw", "dev")
                .with_overlay(overlay.clone())
                .to_entry();

            let leading: Vec<&str> = body.keys().take(3).collect();
            proptest::prop_assert_eq!(leading, keys::BATCH_RESERVED.to_vec());
            proptest::prop_assert_eq!(body.get(keys::SHARED_SECRET), Some(&Value::from("pw")));
            proptest::prop_assert_eq!(body.get(keys::DEVICE_ID), Some(&Value::from("dev")));
            proptest::prop_assert!(body.get(keys::RECORDS).and_then(Value::as_array).is_some());
            for (key, value) in overlay.iter() {
                if !keys::BATCH_RESERVED.contains(&key) {
                    proptest::prop_assert_eq!(body.get(key), Some(value));
                }
            }
        }
    }
}
