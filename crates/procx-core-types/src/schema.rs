//! Canonical schema constants for structured logging and events
//!
//! These constants keep field names consistent between the interceptor
//! chain, the store and test assertions.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_INVOCATION_ID: &str = "invocation_id";
pub const FIELD_ATTEMPT: &str = "attempt";

// Entity identifiers
pub const FIELD_ENTITY_TYPE: &str = "entity_type";
pub const FIELD_ENTITY_ID: &str = "entity_id";
pub const FIELD_USER_ID: &str = "user_id";

// Flush statistics
pub const FIELD_FLUSH_OPS: &str = "flush_ops";
pub const FIELD_AUDIT_ENTRIES: &str = "audit_entries";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
pub const EVENT_RETRY: &str = "retry";
pub const EVENT_ROLLBACK: &str = "rollback";
pub const EVENT_FLUSH: &str = "flush";
