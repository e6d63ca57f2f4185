use std::sync::Arc;

use super::{CommandInterceptor, Invocation, Next, Output};
use crate::context::{CommandContext, ContextEnvironment};
use crate::errors::{CommandError, Result};

/// Innermost stage: opens the context, runs the command, flushes
///
/// The session goes back into the invocation on every path so the
/// transaction stage can commit or roll it back.
pub struct ContextInterceptor {
    env: Arc<ContextEnvironment>,
}

impl ContextInterceptor {
    pub fn new(env: Arc<ContextEnvironment>) -> Self {
        Self { env }
    }
}

impl CommandInterceptor for ContextInterceptor {
    fn name(&self) -> &'static str {
        "context"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, _next: Next<'_>) -> Result<Output> {
        let session = invocation.take_session().ok_or_else(|| {
            CommandError::internal("context stage requires an open transaction")
        })?;
        let mut ctx = CommandContext::new(
            session,
            self.env.clone(),
            invocation.correlation.clone(),
            invocation.authentication.clone(),
        );

        let result = invocation
            .command()
            .execute_boxed(&mut ctx)
            .and_then(|output| ctx.flush().map(|()| output));

        invocation.attach_session(ctx.into_session());
        result
    }
}
