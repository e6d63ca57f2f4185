use std::thread;

use super::{CommandInterceptor, Invocation, Next, Output};
use crate::config::RetryBackoff;
use crate::errors::{CommandError, Result};
use crate::log_cmd_retry;
use crate::state::InvocationState;

/// Re-runs the inner chain after optimistic-lock conflicts
///
/// Every attempt gets a fresh transaction and context from the inner
/// stages. At most `1 + budget` attempts run; a conflict on the last one
/// becomes `ConcurrentModification`. Other errors end the loop at once.
pub struct RetryInterceptor {
    budget: u32,
    backoff: RetryBackoff,
}

impl RetryInterceptor {
    pub fn new(budget: u32, backoff: RetryBackoff) -> Self {
        Self { budget, backoff }
    }
}

impl CommandInterceptor for RetryInterceptor {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Output> {
        let mut state = InvocationState::Pending;
        loop {
            state = state.transition(InvocationState::Running)?;
            match next.run(invocation) {
                Ok(output) => {
                    state.transition(InvocationState::Committed)?;
                    return Ok(output);
                }
                Err(err) if err.is_retryable() => {
                    state = state.transition(InvocationState::LockConflict)?;
                    let attempt = invocation.correlation.attempt;
                    if attempt > self.budget {
                        state.transition(InvocationState::Failed)?;
                        tracing::warn!(
                            component = module_path!(),
                            op = invocation.operation(),
                            invocation_id = %invocation.correlation.invocation_id,
                            attempts = attempt,
                            "retry budget exhausted"
                        );
                        return Err(CommandError::ConcurrentModification {
                            operation: invocation.operation().to_string(),
                            attempts: attempt,
                            last_conflict: Box::new(err),
                        });
                    }

                    invocation.correlation.next_attempt();
                    log_cmd_retry!(
                        invocation.operation(),
                        attempt = invocation.correlation.attempt,
                        invocation_id = %invocation.correlation.invocation_id,
                        entity_id = err.entity_id().unwrap_or(""),
                    );
                    let delay = self.backoff.delay_for(attempt);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    state = state.transition(InvocationState::Pending)?;
                }
                Err(err) => {
                    state.transition(InvocationState::Failed)?;
                    return Err(err);
                }
            }
        }
    }
}
