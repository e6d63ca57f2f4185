//! Canonical command logging macros
//!
//! Every macro stamps `component` with the calling module and `event` with a
//! schema constant; extra `key = value` fields are passed through to tracing.

/// Log the start of a command invocation
///
/// ```
/// # use procx_core::log_cmd_start;
/// log_cmd_start!("SetJobRetries");
/// log_cmd_start!("SetJobRetries", invocation_id = "inv-1", attempt = 1u32);
/// ```
#[macro_export]
macro_rules! log_cmd_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of a command invocation
///
/// ```
/// # use procx_core::log_cmd_end;
/// log_cmd_end!("SetJobRetries", duration_ms = 42u64);
/// ```
#[macro_export]
macro_rules! log_cmd_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log a failed command invocation
///
/// ```
/// # use procx_core::{log_cmd_error, errors::CommandError};
/// let err = CommandError::validation("retries", "must not be negative");
/// log_cmd_error!("SetJobRetries", err, duration_ms = 3u64);
/// ```
#[macro_export]
macro_rules! log_cmd_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let err: &$crate::errors::CommandError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?err.kind(),
            err_code = err.code(),
            error = %err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let err: &$crate::errors::CommandError = &$err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?err.kind(),
            err_code = err.code(),
            error = %err,
            $($field)*
        );
    }};
}

/// Log that an attempt lost an optimistic-lock race and will be retried
///
/// ```
/// # use procx_core::log_cmd_retry;
/// log_cmd_retry!("SetJobRetries", attempt = 2u32);
/// ```
#[macro_export]
macro_rules! log_cmd_retry {
    ($op:expr, attempt = $attempt:expr) => {
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_RETRY,
            attempt = $attempt,
        );
    };
    ($op:expr, attempt = $attempt:expr, $($field:tt)*) => {
        tracing::warn!(
            component = module_path!(),
            op = $op,
            event = $crate::logging_facility::schema::EVENT_RETRY,
            attempt = $attempt,
            $($field)*
        );
    };
}
