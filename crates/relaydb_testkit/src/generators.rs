//! Property-based test generators using proptest.

use proptest::prelude::*;
use relaydb_codec::{Entry, Value};

/// Field names, occasionally colliding with reserved record keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("valid regex"),
        1 => Just("_s".to_owned()),
        1 => Just("_u".to_owned()),
    ]
}

/// Scalar values. Floats are finite so they survive JSON unchanged.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        "[ -~]{0,16}".prop_map(Value::Text),
    ]
}

/// Values nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key_strategy(), inner), 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Payload documents with up to eight fields.
pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Overlays: like payloads, with reserved top-level names mixed in.
pub fn overlay_strategy() -> impl Strategy<Value = Entry> {
    let key = prop_oneof![
        6 => prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("valid regex"),
        1 => Just("_pw".to_owned()),
        1 => Just("_did".to_owned()),
        1 => Just("_ent".to_owned()),
    ];
    prop::collection::vec((key, scalar_strategy()), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}
