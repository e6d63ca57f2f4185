//! Correlation types for command invocation tracking
//!
//! An invocation is one call to the command executor; it may span several
//! attempts when optimistic-lock conflicts force a retry. Every audit entry
//! written by an invocation shares one operation id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single command invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(String);

impl InvocationId {
    /// Generate a new random InvocationId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Groups the operation-log entries produced by one attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried through the interceptor chain for correlation
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    pub invocation_id: InvocationId,
    /// 1-based attempt number; bumped by the retry stage
    pub attempt: u32,
}

impl CorrelationContext {
    /// Create a context for the first attempt of a fresh invocation
    pub fn new() -> Self {
        Self {
            invocation_id: InvocationId::new(),
            attempt: 1,
        }
    }

    /// Create a context with an existing InvocationId
    pub fn with_invocation_id(invocation_id: InvocationId) -> Self {
        Self {
            invocation_id,
            attempt: 1,
        }
    }

    /// Advance to the next attempt of the same invocation
    pub fn next_attempt(&mut self) {
        self.attempt += 1;
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}
