//! Command context: the unit of work of a single attempt
//!
//! A context owns the attempt's persistence session, entity cache, pending
//! operation-log entries and authorization scope. Nested commands run inside
//! the same context through [`CommandContext::execute`]; they share its
//! transaction and are never retried on their own.

pub mod entity_cache;
pub mod operation_log;
pub mod optimistic_lock;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use procx_core_types::schema::EVENT_FLUSH;
use procx_core_types::CorrelationContext;

use crate::authorization::{
    self, AllowAll, Authentication, AuthorizationProvider, PermissionCheck,
};
use crate::clock::{Clock, SystemClock};
use crate::command::Command;
use crate::config::{AuditVerbosity, ExecutorConfig};
use crate::errors::{CommandError, Result};
use crate::model::OperationLogEntry;
use crate::persistence::{lock_error, DbEntity, EntityQuery, FlushResult, PersistenceSession};

pub use entity_cache::{EntityCache, EntryStatus};
pub use operation_log::{OperationLogBuffer, UserOperation};
pub use optimistic_lock::{IgnoreConflicts, OptimisticLockingListener, OptimisticLockingResult};

/// Collaborators shared by every context an executor opens
pub struct ContextEnvironment {
    pub clock: Arc<dyn Clock>,
    pub authorization: Arc<dyn AuthorizationProvider>,
    pub authorization_enabled: bool,
    pub audit: AuditVerbosity,
}

impl ContextEnvironment {
    pub fn new(
        config: &ExecutorConfig,
        clock: Arc<dyn Clock>,
        authorization: Arc<dyn AuthorizationProvider>,
    ) -> Self {
        Self {
            clock,
            authorization,
            authorization_enabled: config.authorization_enabled,
            audit: config.audit,
        }
    }
}

impl Default for ContextEnvironment {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            authorization: Arc::new(AllowAll),
            authorization_enabled: false,
            audit: AuditVerbosity::default(),
        }
    }
}

pub struct CommandContext {
    session: Box<dyn PersistenceSession>,
    cache: EntityCache,
    operation_log: OperationLogBuffer,
    env: Arc<ContextEnvironment>,
    correlation: CorrelationContext,
    authentication: Option<Authentication>,
    /// Depth of `run_without_authorization` scopes
    authorization_bypass: u32,
    /// Depth of `without_operation_log` scopes
    log_suppression: u32,
    locking_listeners: Vec<Box<dyn OptimisticLockingListener>>,
}

impl CommandContext {
    pub fn new(
        session: Box<dyn PersistenceSession>,
        env: Arc<ContextEnvironment>,
        correlation: CorrelationContext,
        authentication: Option<Authentication>,
    ) -> Self {
        Self {
            session,
            cache: EntityCache::new(),
            operation_log: OperationLogBuffer::new(),
            env,
            correlation,
            authentication,
            authorization_bypass: 0,
            log_suppression: 0,
            locking_listeners: Vec::new(),
        }
    }

    pub fn correlation(&self) -> &CorrelationContext {
        &self.correlation
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.authentication.as_ref().map(|a| a.user_id.as_str())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    // ===== Nested execution and scopes =====

    /// Run a nested command in this context
    ///
    /// The nested command's own authorization checks run unless the caller
    /// is inside [`run_without_authorization`](Self::run_without_authorization).
    /// Its changes share this context's flush; its errors abort the caller.
    pub fn execute<C: Command>(&mut self, command: &C) -> Result<C::Output> {
        tracing::trace!(
            component = module_path!(),
            op = command.operation_type(),
            invocation_id = %self.correlation.invocation_id,
            "nested command"
        );
        self.check_authorization(&command.authorization_checks())?;
        command.execute(self)
    }

    /// Whether permission checks currently apply
    pub fn is_authorization_active(&self) -> bool {
        self.env.authorization_enabled
            && self.authentication.is_some()
            && self.authorization_bypass == 0
    }

    /// Evaluate checks against the acting user, if authorization is active
    pub fn check_authorization(&self, checks: &[PermissionCheck]) -> Result<()> {
        match &self.authentication {
            Some(auth) if self.is_authorization_active() => {
                authorization::check_all(self.env.authorization.as_ref(), auth, checks)
            }
            _ => Ok(()),
        }
    }

    /// Run `f` with permission checks of nested commands suppressed
    pub fn run_without_authorization<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.authorization_bypass += 1;
        let result = f(self);
        self.authorization_bypass -= 1;
        result
    }

    /// Run `f` without recording operation-log entries
    pub fn without_operation_log<R>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.log_suppression += 1;
        let result = f(self);
        self.log_suppression -= 1;
        result
    }

    // ===== Entity access =====

    pub fn find<T: DbEntity>(&mut self, id: &str) -> Result<Option<T>> {
        self.cache.get_or_load(self.session.as_mut(), id)
    }

    /// Like [`find`](Self::find) but a missing entity is `NotFound`
    pub fn get<T: DbEntity>(&mut self, id: &str) -> Result<T> {
        self.find(id)?
            .ok_or_else(|| CommandError::not_found(T::ENTITY_TYPE, id))
    }

    pub fn select_list<T: DbEntity>(&mut self, query: &EntityQuery) -> Result<Vec<T>> {
        self.cache.select_list(self.session.as_mut(), query)
    }

    pub fn insert<T: DbEntity>(&mut self, entity: &T) -> Result<()> {
        self.cache.insert(entity)
    }

    pub fn update<T: DbEntity>(&mut self, entity: &T) -> Result<()> {
        self.cache.update(entity)
    }

    pub fn delete<T: DbEntity>(&mut self, entity: &T) -> Result<()> {
        self.cache.delete(entity)
    }

    pub fn entity_cache(&self) -> &EntityCache {
        &self.cache
    }

    // ===== Operation log =====

    /// Queue an audit record for this attempt
    ///
    /// Dropped inside `without_operation_log`, when auditing is off, or when
    /// auditing is limited to authenticated users and nobody is authenticated.
    pub fn log_operation(&mut self, operation: UserOperation) {
        if self.log_suppression > 0 {
            return;
        }
        let user_id = self.user_id().map(str::to_string);
        match self.env.audit {
            AuditVerbosity::Off => return,
            AuditVerbosity::Authenticated if user_id.is_none() => return,
            _ => {}
        }
        let now = self.now();
        self.operation_log.record(operation, user_id, now);
    }

    pub fn pending_operation_log(&self) -> &[OperationLogEntry] {
        self.operation_log.entries()
    }

    pub fn register_optimistic_locking_listener(
        &mut self,
        listener: Box<dyn OptimisticLockingListener>,
    ) {
        self.locking_listeners.push(listener);
    }

    // ===== Flush =====

    /// Write all pending changes and audit entries through the session
    ///
    /// Stops at the first revision conflict no listener ignores; the caller
    /// must then roll back the transaction.
    pub(crate) fn flush(&mut self) -> Result<()> {
        let mut ops = self.cache.flush_operations();
        let audit = self.operation_log.drain_operations()?;
        let audit_entries = audit.len();
        ops.extend(audit);
        if ops.is_empty() {
            return Ok(());
        }

        let mut start = 0;
        while start < ops.len() {
            match self.session.execute_operations(&ops[start..])? {
                FlushResult::Applied => break,
                FlushResult::Failed { index, failure } => {
                    let failed = &ops[start + index];
                    let decision = optimistic_lock::resolve(&mut self.locking_listeners, failed);
                    tracing::debug!(
                        component = module_path!(),
                        invocation_id = %self.correlation.invocation_id,
                        entity_type = %failed.entity_type(),
                        entity_id = failed.id(),
                        failure = ?failure,
                        decision = ?decision,
                        "flush operation failed"
                    );
                    if decision == OptimisticLockingResult::Throw {
                        return Err(lock_error(failed));
                    }
                    start += index + 1;
                }
            }
        }

        tracing::debug!(
            component = module_path!(),
            event = EVENT_FLUSH,
            invocation_id = %self.correlation.invocation_id,
            attempt = self.correlation.attempt,
            flush_ops = ops.len(),
            audit_entries = audit_entries,
        );
        Ok(())
    }

    /// Release the session so the transaction stage can finish it
    pub(crate) fn into_session(self) -> Box<dyn PersistenceSession> {
        self.session
    }
}
