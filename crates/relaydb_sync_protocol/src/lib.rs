//! # relaydb sync protocol
//!
//! The JSON documents exchanged with the aggregation endpoint.
//!
//! Upload, one per chunk:
//!
//! ```text
//! { "_pw": secret, "_did": device, "_ent": [ {payload..., "_s": seq, "_u": uuid}, ... ], overlay... }
//! ```
//!
//! Acknowledgment:
//!
//! ```text
//! { "status": "ok", "stored_uuids": "[\"uuid\", ...]", "total_count": 42 }
//! ```
//!
//! Reserved keys always win over caller data: a payload's own `_s`/`_u` and
//! an overlay's `_pw`/`_did`/`_ent` are replaced.
//!
//! This crate does no I/O.

pub mod keys;
mod request;
mod response;

pub use request::{BatchRequest, WireRecord};
pub use response::{AckResponse, AckStatus};
