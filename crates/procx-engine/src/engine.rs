//! The process engine facade

use std::sync::Arc;
use std::time::Duration;

use procx_core::commands::{JobHandler, JobHandlerRegistry};
use procx_core::errors::Result;
use procx_core::{
    Authentication, AuthorizationProvider, Clock, CommandExecutor, SessionFactory, SystemClock,
};
use procx_store::{SqliteGrants, SqliteSessionFactory};

use crate::config::EngineConfig;
use crate::job_executor::JobExecutor;
use crate::services::{HistoryService, ManagementService, RuntimeService, TaskService};

/// Configured command executor plus the collaborators services need
pub struct ProcessEngine {
    config: EngineConfig,
    executor: CommandExecutor,
    handlers: Arc<JobHandlerRegistry>,
    grants: Option<Arc<SqliteGrants>>,
}

impl ProcessEngine {
    pub fn builder(config: EngineConfig) -> ProcessEngineBuilder {
        ProcessEngineBuilder {
            config,
            clock: Arc::new(SystemClock),
            handlers: JobHandlerRegistry::new(),
            authorization: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Grant table of a SQLite-backed engine
    pub fn grants(&self) -> Option<&SqliteGrants> {
        self.grants.as_deref()
    }

    pub fn job_handlers(&self) -> &Arc<JobHandlerRegistry> {
        &self.handlers
    }

    pub fn runtime_service(&self) -> RuntimeService<'_> {
        RuntimeService::new(self, None)
    }

    pub fn task_service(&self) -> TaskService<'_> {
        TaskService::new(self, None)
    }

    pub fn management_service(&self) -> ManagementService<'_> {
        ManagementService::new(self, None)
    }

    pub fn history_service(&self) -> HistoryService<'_> {
        HistoryService::new(self, None)
    }

    pub(crate) fn run<C: procx_core::Command>(
        &self,
        command: &C,
        authentication: Option<&Authentication>,
    ) -> Result<C::Output> {
        self.executor.execute_as(command, authentication)
    }

    pub fn job_executor(&self) -> JobExecutor {
        JobExecutor::new(
            self.executor.clone(),
            self.handlers.clone(),
            self.config.job_executor.clone(),
        )
    }
}

pub struct ProcessEngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    handlers: JobHandlerRegistry,
    authorization: Option<Arc<dyn AuthorizationProvider>>,
}

impl ProcessEngineBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn job_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.register(handler);
        self
    }

    /// Overrides the provider; a SQLite engine otherwise reads its grant table
    pub fn authorization_provider(mut self, provider: Arc<dyn AuthorizationProvider>) -> Self {
        self.authorization = Some(provider);
        self
    }

    /// Open the SQLite database named by the configuration
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an invalid configuration and `Persistence`
    /// if the database cannot be opened or migrated.
    pub fn open(self) -> Result<ProcessEngine> {
        self.config.validate()?;
        let path = self.config.database.path.clone();
        let factory = SqliteSessionFactory::open(&path)?
            .with_busy_timeout(Duration::from_millis(self.config.database.busy_timeout_ms));
        let grants = Arc::new(SqliteGrants::open(&path)?);
        tracing::info!(
            component = module_path!(),
            database = %path.display(),
            authorization_enabled = self.config.executor.authorization_enabled,
            "process engine opened"
        );
        self.assemble(Arc::new(factory), Some(grants))
    }

    /// Build over any session factory, e.g. an in-memory store
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an invalid configuration.
    pub fn build(self, factory: Arc<dyn SessionFactory>) -> Result<ProcessEngine> {
        self.config.validate()?;
        self.assemble(factory, None)
    }

    fn assemble(
        self,
        factory: Arc<dyn SessionFactory>,
        grants: Option<Arc<SqliteGrants>>,
    ) -> Result<ProcessEngine> {
        let mut builder = CommandExecutor::builder(factory)
            .config(self.config.executor.clone())
            .clock(self.clock);
        let provider = self.authorization.or_else(|| {
            grants
                .clone()
                .map(|g| -> Arc<dyn AuthorizationProvider> { g })
        });
        if let Some(provider) = provider {
            builder = builder.authorization_provider(provider);
        }

        Ok(ProcessEngine {
            config: self.config,
            executor: builder.build()?,
            handlers: Arc::new(self.handlers),
            grants,
        })
    }
}
