//! Error handling for procx-store
//!
//! Maps SQLite failures onto the core `CommandError` taxonomy

use procx_core::errors::CommandError;
use rusqlite::ErrorCode;

/// Result type alias using CommandError
pub type Result<T> = std::result::Result<T, CommandError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> CommandError {
    CommandError::persistence(
        "migration",
        format!("Migration {} failed: {}", migration_id, reason),
    )
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> CommandError {
    CommandError::persistence(
        "migration_checksum",
        format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ),
    )
}

/// Convert a rusqlite error
///
/// Busy and locked databases mean another transaction got in the way; those
/// become the retryable `TransactionConflict`.
pub fn from_rusqlite(err: rusqlite::Error) -> CommandError {
    let busy = matches!(
        &err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    );
    if busy {
        CommandError::TransactionConflict {
            message: err.to_string(),
        }
    } else {
        CommandError::persistence("sqlite", err.to_string())
    }
}

/// Primary-key or unique constraint violated
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}
