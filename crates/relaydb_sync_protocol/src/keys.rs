//! Reserved wire keys.

/// Shared secret at the top level of an upload.
pub const SHARED_SECRET: &str = "_pw";

/// Device identifier at the top level of an upload.
pub const DEVICE_ID: &str = "_did";

/// Record array at the top level of an upload.
pub const RECORDS: &str = "_ent";

/// Sequence id inside each uploaded record.
pub const SEQUENCE: &str = "_s";

/// Idempotency uuid inside each uploaded record.
pub const UUID: &str = "_u";

/// Acknowledgment status field.
pub const STATUS: &str = "status";

/// Acknowledged uuids, a JSON array encoded as a string.
pub const STORED_UUIDS: &str = "stored_uuids";

/// Endpoint's running total of stored records.
pub const TOTAL_COUNT: &str = "total_count";

/// The only status value that counts as success.
pub const STATUS_OK: &str = "ok";

/// Top-level keys an overlay cannot override.
pub const BATCH_RESERVED: [&str; 3] = [SHARED_SECRET, DEVICE_ID, RECORDS];

/// Record keys a payload cannot override.
pub const RECORD_RESERVED: [&str; 2] = [SEQUENCE, UUID];
