//! Command executor
//!
//! Entry point for running commands. Builds the interceptor chain from an
//! [`ExecutorConfig`] and drives each call through it.

use std::sync::Arc;

use crate::authorization::{AllowAll, Authentication, AuthorizationProvider};
use crate::clock::{Clock, SystemClock};
use crate::command::Command;
use crate::config::{ExecutorConfig, InterceptorKind};
use crate::context::ContextEnvironment;
use crate::errors::{CommandError, Result};
use crate::interceptor::{
    AuthorizationInterceptor, CommandInterceptor, ContextInterceptor, Invocation,
    LoggingInterceptor, Next, RetryInterceptor, TransactionInterceptor,
};
use crate::persistence::SessionFactory;

/// Runs commands through the configured interceptor chain
///
/// Cheap to clone; clones share the chain and its collaborators.
#[derive(Clone)]
pub struct CommandExecutor {
    chain: Arc<Vec<Arc<dyn CommandInterceptor>>>,
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn builder(factory: Arc<dyn SessionFactory>) -> CommandExecutorBuilder {
        CommandExecutorBuilder {
            factory,
            config: ExecutorConfig::default(),
            clock: Arc::new(SystemClock),
            authorization: Arc::new(AllowAll),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Names of the chain's stages, outermost first
    pub fn stages(&self) -> Vec<&'static str> {
        self.chain.iter().map(|stage| stage.name()).collect()
    }

    /// Run a command as the system (no authentication)
    pub fn execute<C: Command>(&self, command: &C) -> Result<C::Output> {
        self.execute_as(command, None)
    }

    /// Run a command, optionally as an authenticated user
    ///
    /// # Errors
    ///
    /// Returns the command's terminal error unchanged, or
    /// `ConcurrentModification` once the retry budget is spent.
    pub fn execute_as<C: Command>(
        &self,
        command: &C,
        authentication: Option<&Authentication>,
    ) -> Result<C::Output> {
        let mut invocation = Invocation::new(command, authentication.cloned());
        let output = Next::new(&self.chain).run(&mut invocation)?;
        output
            .downcast::<C::Output>()
            .map(|boxed| *boxed)
            .map_err(|_| {
                CommandError::internal(format!(
                    "command '{}' produced an unexpected output type",
                    command.operation_type()
                ))
            })
    }
}

pub struct CommandExecutorBuilder {
    factory: Arc<dyn SessionFactory>,
    config: ExecutorConfig,
    clock: Arc<dyn Clock>,
    authorization: Arc<dyn AuthorizationProvider>,
}

impl CommandExecutorBuilder {
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn authorization_provider(mut self, provider: Arc<dyn AuthorizationProvider>) -> Self {
        self.authorization = provider;
        self
    }

    /// # Errors
    ///
    /// Returns `Configuration` if the interceptor order is invalid.
    pub fn build(self) -> Result<CommandExecutor> {
        self.config.validate()?;
        let env = Arc::new(ContextEnvironment::new(
            &self.config,
            self.clock,
            self.authorization.clone(),
        ));

        let chain: Vec<Arc<dyn CommandInterceptor>> = self
            .config
            .interceptors
            .iter()
            .map(|kind| -> Arc<dyn CommandInterceptor> {
                match kind {
                    InterceptorKind::Retry => Arc::new(RetryInterceptor::new(
                        self.config.retry_budget,
                        self.config.retry_backoff,
                    )),
                    InterceptorKind::Transaction => {
                        Arc::new(TransactionInterceptor::new(self.factory.clone()))
                    }
                    InterceptorKind::Authorization => Arc::new(AuthorizationInterceptor::new(
                        self.authorization.clone(),
                        self.config.authorization_enabled,
                    )),
                    InterceptorKind::Logging => Arc::new(LoggingInterceptor),
                    InterceptorKind::Context => Arc::new(ContextInterceptor::new(env.clone())),
                }
            })
            .collect();

        tracing::debug!(
            component = module_path!(),
            stages = ?self.config.interceptors,
            retry_budget = self.config.retry_budget,
            authorization_enabled = self.config.authorization_enabled,
            "command executor built"
        );

        Ok(CommandExecutor {
            chain: Arc::new(chain),
            config: self.config,
        })
    }
}
