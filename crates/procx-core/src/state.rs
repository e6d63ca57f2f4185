//! Per-invocation state machine driven by the retry stage
//!
//! ```text
//! Pending -> Running -> Committed
//!                    -> LockConflict -> Pending
//!                    -> Failed
//! ```

use std::fmt;

use crate::errors::{CommandError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    Running,
    LockConflict,
    Committed,
    Failed,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvocationState::Committed | InvocationState::Failed)
    }

    pub fn can_transition_to(&self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Committed)
                | (Running, LockConflict)
                | (Running, Failed)
                | (LockConflict, Pending)
                | (LockConflict, Failed)
        )
    }

    /// # Errors
    ///
    /// Returns `Internal` for a transition the machine does not allow.
    pub fn transition(self, next: InvocationState) -> Result<InvocationState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CommandError::internal(format!(
                "invalid invocation state transition {self} -> {next}"
            )))
        }
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvocationState::Pending => "PENDING",
            InvocationState::Running => "RUNNING",
            InvocationState::LockConflict => "LOCK_CONFLICT",
            InvocationState::Committed => "COMMITTED",
            InvocationState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::InvocationState::*;
    use super::*;

    #[test]
    fn test_retry_cycle() {
        let state = Pending
            .transition(Running)
            .and_then(|s| s.transition(LockConflict))
            .and_then(|s| s.transition(Pending))
            .and_then(|s| s.transition(Running))
            .and_then(|s| s.transition(Committed))
            .unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_exhausted_conflict_fails() {
        assert_eq!(LockConflict.transition(Failed).unwrap(), Failed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(Committed.transition(Running).is_err());
        assert!(Failed.transition(Pending).is_err());
        assert!(Pending.transition(Committed).is_err());
    }
}
