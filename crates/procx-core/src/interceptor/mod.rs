//! Interceptor chain
//!
//! Each stage wraps the next. The chain is built outermost-first from the
//! executor configuration; the innermost stage opens the command context.
//! Stages see the command through the object-safe [`DynCommand`] view and
//! pass its output along as `Box<dyn Any + Send>`.

mod authorization;
mod context;
mod logging;
mod retry;
mod transaction;

use std::any::Any;
use std::sync::Arc;

use procx_core_types::CorrelationContext;

use crate::authorization::Authentication;
use crate::command::DynCommand;
use crate::errors::{CommandError, Result};
use crate::persistence::PersistenceSession;

pub use authorization::AuthorizationInterceptor;
pub use context::ContextInterceptor;
pub use logging::LoggingInterceptor;
pub use retry::RetryInterceptor;
pub use transaction::TransactionInterceptor;

/// Type-erased command output
pub type Output = Box<dyn Any + Send>;

/// State of one executor call as it travels through the chain
pub struct Invocation<'a> {
    command: &'a dyn DynCommand,
    pub correlation: CorrelationContext,
    pub authentication: Option<Authentication>,
    session: Option<Box<dyn PersistenceSession>>,
}

impl<'a> Invocation<'a> {
    pub fn new(command: &'a dyn DynCommand, authentication: Option<Authentication>) -> Self {
        Self {
            command,
            correlation: CorrelationContext::new(),
            authentication,
            session: None,
        }
    }

    pub fn command(&self) -> &'a dyn DynCommand {
        self.command
    }

    pub fn operation(&self) -> &'a str {
        self.command.name()
    }

    /// Hand the open transaction to inner stages
    pub fn attach_session(&mut self, session: Box<dyn PersistenceSession>) {
        self.session = Some(session);
    }

    pub fn take_session(&mut self) -> Option<Box<dyn PersistenceSession>> {
        self.session.take()
    }
}

pub trait CommandInterceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Do this stage's work around `next.run(invocation)`
    fn invoke(&self, invocation: &mut Invocation<'_>, next: Next<'_>) -> Result<Output>;
}

/// The remaining stages after the current one
///
/// `Copy`, so a stage may run the rest of the chain more than once.
#[derive(Clone, Copy)]
pub struct Next<'c> {
    rest: &'c [Arc<dyn CommandInterceptor>],
}

impl<'c> Next<'c> {
    pub fn new(chain: &'c [Arc<dyn CommandInterceptor>]) -> Self {
        Self { rest: chain }
    }

    pub fn run(self, invocation: &mut Invocation<'_>) -> Result<Output> {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.invoke(invocation, Next { rest }),
            None => Err(CommandError::internal(
                "interceptor chain ended without a context stage",
            )),
        }
    }
}
