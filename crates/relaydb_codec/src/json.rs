//! JSON serialization contract for [`Value`] and [`Entry`].
//!
//! - field order is preserved in both directions
//! - integers that fit `i64` stay integers; everything else numeric is a float
//! - finite floats decode to exactly the value that was encoded
//! - non-finite floats are written as `null`
//! - duplicate keys in input keep the first position and the last value

use crate::entry::Entry;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) => serializer.serialize_unit(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entry) => entry.serialize(serializer),
        }
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Value, A::Error> {
        EntryVisitor.visit_map(map).map(Value::Object)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct EntryVisitor;

impl<'de> Visitor<'de> for EntryVisitor {
    type Value = Entry;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entry, A::Error> {
        let mut entry = Entry::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entry.insert(key, value);
        }
        Ok(entry)
    }
}

impl<'de> Deserialize<'de> for Entry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntryVisitor)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Value::Integer(i),
                (None, Some(f)) => Value::Float(f),
                (None, None) => Value::Null,
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<serde_json::Value> for Entry {
    type Error = CodecError;

    fn try_from(json: serde_json::Value) -> CodecResult<Self> {
        match Value::from(json) {
            Value::Object(entry) => Ok(entry),
            other => Err(CodecError::NotAnObject {
                found: other.kind(),
            }),
        }
    }
}

/// Encodes any serializable document to JSON bytes.
pub fn to_json_vec<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

/// Decodes an [`Entry`] from JSON bytes.
///
/// # Errors
///
/// Fails with [`CodecError::Decode`] on malformed JSON or a non-object root.
pub fn entry_from_json(bytes: &[u8]) -> CodecResult<Entry> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_order_survives_encoding() {
        let entry = Entry::new().with("zeta", 1).with("alpha", 2).with("mid", 3);
        let bytes = to_json_vec(&entry).unwrap();
        assert_eq!(bytes, br#"{"zeta":1,"alpha":2,"mid":3}"#);
        assert_eq!(entry_from_json(&bytes).unwrap(), entry);
    }

    #[test]
    fn integers_and_floats_stay_distinct() {
        let entry = entry_from_json(br#"{"i":3,"f":3.0,"big":18446744073709551615}"#).unwrap();
        assert_eq!(entry.get("i"), Some(&Value::Integer(3)));
        assert_eq!(entry.get("f"), Some(&Value::Float(3.0)));
        assert!(matches!(entry.get("big"), Some(Value::Float(_))));
    }

    #[test]
    fn non_finite_floats_encode_as_null() {
        let entry = Entry::new().with("nan", f64::NAN).with("inf", f64::INFINITY);
        assert_eq!(to_json_vec(&entry).unwrap(), br#"{"nan":null,"inf":null}"#);
    }

    #[test]
    fn nested_documents_decode() {
        let entry = entry_from_json(br#"{"user":{"id":7,"tags":["a",null,true]}}"#).unwrap();
        let user = entry.get("user").and_then(Value::as_object).unwrap();
        assert_eq!(user.get("id"), Some(&Value::Integer(7)));
        assert_eq!(
            user.get("tags").and_then(Value::as_array).map(<[Value]>::len),
            Some(3)
        );
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(matches!(entry_from_json(b"[1,2]"), Err(CodecError::Decode(_))));
        assert!(matches!(entry_from_json(b"{oops"), Err(CodecError::Decode(_))));
        assert!(matches!(
            Entry::try_from(json!("text")),
            Err(CodecError::NotAnObject { found: "text" })
        ));
    }

    #[test]
    fn converts_from_json_macro() {
        let entry = Entry::try_from(json!({"a": 1, "b": [1.5, "x"]})).unwrap();
        assert_eq!(entry.get("a"), Some(&Value::Integer(1)));
        assert_eq!(
            entry.get("b"),
            Some(&Value::Array(vec![Value::Float(1.5), Value::Text("x".into())]))
        );
    }

    #[test]
    fn long_float_survives_reencoding() {
        let entry = Entry::new().with("a", -196_998_293.864_734_98);
        let decoded = entry_from_json(&to_json_vec(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    proptest::proptest! {
        #[test]
        fn finite_floats_are_exact_after_decoding(
            x in proptest::num::f64::POSITIVE
                | proptest::num::f64::NEGATIVE
                | proptest::num::f64::NORMAL
                | proptest::num::f64::SUBNORMAL
                | proptest::num::f64::ZERO
        ) {
            let entry = Entry::new().with("x", x);
            let decoded = entry_from_json(&to_json_vec(&entry).unwrap()).unwrap();
            let back = decoded.get("x").and_then(Value::as_f64).unwrap();
            proptest::prop_assert_eq!(back, x);
        }

        #[test]
        fn duplicate_keys_keep_first_position_and_last_value(
            keys in proptest::collection::vec("[a-e]", 1..16)
        ) {
            let fields: Vec<String> = keys
                .iter()
                .enumerate()
                .map(|(n, key)| format!(r#""{key}":{n}"#))
                .collect();
            let text = format!("{{{}}}", fields.join(","));
            let entry = entry_from_json(text.as_bytes()).unwrap();

            let mut expected: Vec<(&str, i64)> = Vec::new();
            for (n, key) in keys.iter().enumerate() {
                match expected.iter_mut().find(|(k, _)| *k == key.as_str()) {
                    Some(slot) => slot.1 = n as i64,
                    None => expected.push((key.as_str(), n as i64)),
                }
            }
            let actual: Vec<(&str, i64)> = entry
                .iter()
                .map(|(k, v)| (k, v.as_integer().unwrap()))
                .collect();
            proptest::prop_assert_eq!(actual, expected);
        }
    }
}
