use std::time::Instant;

use super::{CommandInterceptor, Invocation, Next, Output};
use crate::errors::Result;
use crate::{log_cmd_end, log_cmd_error, log_cmd_start};

/// Emits start/end/error events with duration for every attempt
pub struct LoggingInterceptor;

impl CommandInterceptor for LoggingInterceptor {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Output> {
        let op = invocation.operation();
        let invocation_id = invocation.correlation.invocation_id.clone();
        let attempt = invocation.correlation.attempt;
        let user_id = invocation
            .authentication
            .as_ref()
            .map(|a| a.user_id.clone())
            .unwrap_or_default();

        log_cmd_start!(
            op,
            invocation_id = %invocation_id,
            attempt = attempt,
            user_id = user_id.as_str(),
        );
        let started = Instant::now();

        let result = next.run(invocation);

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                log_cmd_end!(
                    op,
                    duration_ms = duration_ms,
                    invocation_id = %invocation_id,
                    attempt = attempt,
                );
            }
            Err(err) => {
                log_cmd_error!(
                    op,
                    err,
                    duration_ms = duration_ms,
                    invocation_id = %invocation_id,
                    attempt = attempt,
                );
            }
        }
        result
    }
}
