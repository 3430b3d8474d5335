//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Entity identifiers
pub const FIELD_TABLE: &str = "table";
pub const FIELD_OWNER_ID: &str = "owner_id";
pub const FIELD_VERSION_ID: &str = "version_id";
pub const FIELD_VERSION_NUMBER: &str = "version_number";
pub const FIELD_ATTACHMENT_ID: &str = "attachment_id";

// Transaction hooks
pub const FIELD_DEFERRED_COUNT: &str = "deferred_count";
pub const FIELD_TX_DEPTH: &str = "tx_depth";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
