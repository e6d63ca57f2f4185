use thiserror::Error;

use crate::authorization::{Permission, ResourceType};
use crate::persistence::EntityType;

/// Result type alias using CommandError
pub type Result<T> = std::result::Result<T, CommandError>;

/// Canonical error kind taxonomy
///
/// Every [`CommandError`] maps to exactly one kind. The kind decides whether
/// the retry stage may re-run the command and supplies a stable code for
/// programmatic handling by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Terminal, raised by command bodies
    Validation,
    NotFound,
    AuthorizationDenied,
    BusinessRule,
    JobFailure,

    // Concurrency
    OptimisticLock,
    ConcurrentModification,

    // Infrastructure
    Persistence,
    Configuration,
    Internal,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ERR_VALIDATION",
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::AuthorizationDenied => "ERR_AUTHORIZATION_DENIED",
            ErrorKind::BusinessRule => "ERR_BUSINESS_RULE",
            ErrorKind::JobFailure => "ERR_JOB_FAILURE",
            ErrorKind::OptimisticLock => "ERR_OPTIMISTIC_LOCK",
            ErrorKind::ConcurrentModification => "ERR_CONCURRENT_MODIFICATION",
            ErrorKind::Persistence => "ERR_PERSISTENCE",
            ErrorKind::Configuration => "ERR_CONFIGURATION",
            ErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Only lost races against another writer are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::OptimisticLock)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error taxonomy for command execution
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    // ===== Terminal errors =====
    /// Malformed or missing input, rejected before anything is loaded
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Referenced entity does not exist
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: EntityType, id: String },

    /// Acting user lacks a permission
    #[error("User '{user_id}' lacks {permission} permission on {resource_type} '{resource_id}'")]
    AuthorizationDenied {
        user_id: String,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: String,
    },

    /// Entity state forbids the requested change
    #[error("{reason} ({entity_type} {id})")]
    BusinessRule {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    /// A job handler reported a failure while executing a job
    #[error("Job {job_id} failed: {message}")]
    JobFailure { job_id: String, message: String },

    // ===== Retryable errors =====
    /// A versioned write affected no row: a concurrent writer committed first
    #[error("{entity_type} '{id}' was updated by another transaction concurrently (expected revision {expected_revision:?})")]
    OptimisticLock {
        entity_type: EntityType,
        id: String,
        expected_revision: Option<i64>,
    },

    /// The store aborted the transaction because of a concurrent transaction
    #[error("Transaction aborted by a concurrent transaction: {message}")]
    TransactionConflict { message: String },

    // ===== Retry exhaustion =====
    /// Retry budget exhausted while still losing optimistic-lock races
    #[error("Command '{operation}' failed after {attempts} attempts due to concurrent modification: {last_conflict}")]
    ConcurrentModification {
        operation: String,
        attempts: u32,
        last_conflict: Box<CommandError>,
    },

    // ===== Infrastructure =====
    #[error("Persistence failure in '{op}': {message}")]
    Persistence { op: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CommandError {
    /// Create a validation error for a named input field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CommandError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        CommandError::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create a business-rule violation
    pub fn business_rule(
        entity_type: EntityType,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CommandError::BusinessRule {
            entity_type,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(op: impl Into<String>, message: impl Into<String>) -> Self {
        CommandError::Persistence {
            op: op.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CommandError::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CommandError::Internal {
            message: message.into(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Validation { .. } => ErrorKind::Validation,
            CommandError::NotFound { .. } => ErrorKind::NotFound,
            CommandError::AuthorizationDenied { .. } => ErrorKind::AuthorizationDenied,
            CommandError::BusinessRule { .. } => ErrorKind::BusinessRule,
            CommandError::JobFailure { .. } => ErrorKind::JobFailure,
            CommandError::OptimisticLock { .. } | CommandError::TransactionConflict { .. } => {
                ErrorKind::OptimisticLock
            }
            CommandError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            CommandError::Persistence { .. } => ErrorKind::Persistence,
            CommandError::Configuration { .. } => ErrorKind::Configuration,
            CommandError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Id of the entity the error refers to, if any
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            CommandError::NotFound { id, .. }
            | CommandError::BusinessRule { id, .. }
            | CommandError::OptimisticLock { id, .. } => Some(id),
            CommandError::AuthorizationDenied { resource_id, .. } => Some(resource_id),
            CommandError::JobFailure { job_id, .. } => Some(job_id),
            CommandError::ConcurrentModification { last_conflict, .. } => {
                last_conflict.entity_id()
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        CommandError::persistence("entity_state", err.to_string())
    }
}
