//! Job commands

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::require_id;
use crate::authorization::{Permission, PermissionCheck, ResourceType, ANY};
use crate::command::{Authorizable, Command, Loggable};
use crate::context::operation_log::{OPERATION_TYPE_DELETE, OPERATION_TYPE_SET_JOB_RETRIES};
use crate::context::{CommandContext, OptimisticLockingListener, OptimisticLockingResult};
use crate::errors::{CommandError, Result};
use crate::model::{Job, PropertyChange};
use crate::persistence::{DbOperation, EntityQuery, EntityType};

// ===== CreateJob =====

#[derive(Debug, Clone)]
pub struct CreateJobCmd {
    pub id: Option<String>,
    pub job_type: String,
    pub process_instance_id: Option<String>,
    pub retries: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub payload: Value,
}

impl CreateJobCmd {
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            id: None,
            job_type: job_type.into(),
            process_instance_id: None,
            retries: Job::DEFAULT_RETRIES,
            due_date: None,
            payload: Value::Null,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn for_process_instance(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }

    pub fn with_retries(mut self, retries: i32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn due_at(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }
}

impl Authorizable for CreateJobCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        match &self.process_instance_id {
            Some(pi) => vec![PermissionCheck::new(
                Permission::Update,
                ResourceType::ProcessInstance,
                pi.as_str(),
            )],
            None => vec![PermissionCheck::new(Permission::Create, ResourceType::Job, ANY)],
        }
    }
}

impl Loggable for CreateJobCmd {
    fn operation_type(&self) -> &str {
        "CreateJob"
    }
}

impl Command for CreateJobCmd {
    type Output = Job;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Job> {
        require_id("job_type", &self.job_type)?;
        if self.retries < 0 {
            return Err(CommandError::validation("retries", "must not be negative"));
        }

        let mut job = Job::new(self.job_type.as_str(), ctx.now());
        if let Some(id) = &self.id {
            require_id("id", id)?;
            if ctx.jobs().find_by_id(id)?.is_some() {
                return Err(CommandError::business_rule(
                    EntityType::Job,
                    id.as_str(),
                    "a job with this id already exists",
                ));
            }
            job.id = id.clone();
        }
        if let Some(pi) = &self.process_instance_id {
            let execution = ctx.executions().get(pi)?;
            job.process_instance_id = Some(execution.id);
            job.suspension_state = execution.suspension_state;
        }
        job.retries = self.retries;
        job.due_date = self.due_date;
        job.payload = self.payload.clone();

        ctx.jobs().insert(&job)?;
        job.rev = 1;
        Ok(job)
    }
}

// ===== GetJob / ListJobs =====

#[derive(Debug, Clone)]
pub struct GetJobCmd {
    pub job_id: String,
}

impl GetJobCmd {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl Authorizable for GetJobCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Read, ResourceType::Job, self.job_id.as_str())]
    }
}

impl Loggable for GetJobCmd {
    fn operation_type(&self) -> &str {
        "GetJob"
    }
}

impl Command for GetJobCmd {
    type Output = Job;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Job> {
        require_id("job_id", &self.job_id)?;
        ctx.jobs().get(&self.job_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListJobsCmd {
    pub process_instance_id: Option<String>,
    pub job_type: Option<String>,
}

impl Authorizable for ListJobsCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Read, ResourceType::Job, ANY)]
    }
}

impl Loggable for ListJobsCmd {
    fn operation_type(&self) -> &str {
        "ListJobs"
    }
}

impl Command for ListJobsCmd {
    type Output = Vec<Job>;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Vec<Job>> {
        let mut query = EntityQuery::of::<Job>();
        if let Some(pi) = &self.process_instance_id {
            query = query.filter("process_instance_id", pi.as_str());
        }
        if let Some(job_type) = &self.job_type {
            query = query.filter("job_type", job_type.as_str());
        }
        ctx.jobs().find_by_query(&query)
    }
}

// ===== SetJobRetries =====

#[derive(Debug, Clone)]
pub struct SetJobRetriesCmd {
    pub job_id: String,
    pub retries: i32,
}

impl SetJobRetriesCmd {
    pub fn new(job_id: impl Into<String>, retries: i32) -> Self {
        Self {
            job_id: job_id.into(),
            retries,
        }
    }
}

impl Authorizable for SetJobRetriesCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Update, ResourceType::Job, self.job_id.as_str())]
    }
}

impl Loggable for SetJobRetriesCmd {
    fn operation_type(&self) -> &str {
        "SetJobRetries"
    }
}

impl Command for SetJobRetriesCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        require_id("job_id", &self.job_id)?;
        if self.retries < 0 {
            return Err(CommandError::validation(
                "retries",
                format!("must be >= 0, was {}", self.retries),
            ));
        }

        let mut job = ctx.jobs().get(&self.job_id)?;
        let previous = job.retries;
        job.retries = self.retries;
        if self.retries > 0 {
            job.exception_message = None;
        }
        ctx.jobs().update(&job)?;

        ctx.operation_log().log_job_operation(
            OPERATION_TYPE_SET_JOB_RETRIES,
            &job,
            vec![PropertyChange::changed("retries", previous, self.retries)],
        );
        Ok(())
    }
}

// ===== DeleteJob =====

#[derive(Debug, Clone)]
pub struct DeleteJobCmd {
    pub job_id: String,
}

impl DeleteJobCmd {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl Authorizable for DeleteJobCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Delete, ResourceType::Job, self.job_id.as_str())]
    }
}

impl Loggable for DeleteJobCmd {
    fn operation_type(&self) -> &str {
        "DeleteJob"
    }
}

impl Command for DeleteJobCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        require_id("job_id", &self.job_id)?;
        let job = ctx.jobs().get(&self.job_id)?;
        if job.lock_owner.is_some() {
            return Err(CommandError::business_rule(
                EntityType::Job,
                job.id.as_str(),
                "Cannot delete job when the job is being executed. Try again later.",
            ));
        }

        ctx.jobs().delete(&job)?;
        ctx.operation_log()
            .log_job_operation(OPERATION_TYPE_DELETE, &job, Vec::new());
        Ok(())
    }
}

// ===== AcquireJobs =====

/// Ids locked by one acquisition pass
///
/// Jobs whose lock lost a race at flush are removed after the fact, so read
/// the ids only once the executor call has returned.
#[derive(Debug, Clone, Default)]
pub struct AcquiredJobs {
    ids: Arc<Mutex<Vec<String>>>,
}

impl AcquiredJobs {
    pub fn job_ids(&self) -> Vec<String> {
        self.ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.job_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops jobs acquired concurrently by someone else instead of failing
struct AcquisitionConflictListener {
    acquired: AcquiredJobs,
}

impl OptimisticLockingListener for AcquisitionConflictListener {
    fn entity_type(&self) -> Option<EntityType> {
        Some(EntityType::Job)
    }

    fn failed_operation(&mut self, operation: &DbOperation) -> OptimisticLockingResult {
        if let DbOperation::Update { id, .. } = operation {
            if let Ok(mut ids) = self.acquired.ids.lock() {
                ids.retain(|acquired| acquired != id);
            }
            return OptimisticLockingResult::Ignore;
        }
        OptimisticLockingResult::Throw
    }
}

#[derive(Debug, Clone)]
pub struct AcquireJobsCmd {
    pub lock_owner: String,
    pub lock_duration: Duration,
    pub max_jobs: usize,
}

impl AcquireJobsCmd {
    pub fn new(lock_owner: impl Into<String>, lock_duration: Duration, max_jobs: usize) -> Self {
        Self {
            lock_owner: lock_owner.into(),
            lock_duration,
            max_jobs,
        }
    }
}

impl Authorizable for AcquireJobsCmd {}

impl Loggable for AcquireJobsCmd {
    fn operation_type(&self) -> &str {
        "AcquireJobs"
    }
}

impl Command for AcquireJobsCmd {
    type Output = AcquiredJobs;

    fn execute(&self, ctx: &mut CommandContext) -> Result<AcquiredJobs> {
        require_id("lock_owner", &self.lock_owner)?;
        let now = ctx.now();
        let expiration = now + self.lock_duration;

        let acquired = AcquiredJobs::default();
        let mut ids = Vec::new();
        for mut job in ctx.jobs().find_executable(now, self.max_jobs)? {
            job.lock(self.lock_owner.as_str(), expiration);
            ctx.jobs().update(&job)?;
            ids.push(job.id);
        }
        if let Ok(mut shared) = acquired.ids.lock() {
            *shared = ids;
        }

        ctx.register_optimistic_locking_listener(Box::new(AcquisitionConflictListener {
            acquired: acquired.clone(),
        }));
        Ok(acquired)
    }
}

// ===== ExecuteJob =====

/// Executes jobs of one type
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> &str;

    /// Runs inside the job's transaction; changes made through `ctx` commit
    /// together with the job's removal.
    fn execute(&self, job: &Job, ctx: &mut CommandContext) -> Result<()>;
}

/// Job handlers keyed by job type
#[derive(Clone, Default)]
pub struct JobHandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.job_type().to_string(), handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// The job vanished or is no longer locked by this owner
    Skipped,
}

pub struct ExecuteJobCmd {
    pub job_id: String,
    pub lock_owner: String,
    pub handlers: Arc<JobHandlerRegistry>,
}

impl ExecuteJobCmd {
    pub fn new(
        job_id: impl Into<String>,
        lock_owner: impl Into<String>,
        handlers: Arc<JobHandlerRegistry>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            lock_owner: lock_owner.into(),
            handlers,
        }
    }
}

impl Authorizable for ExecuteJobCmd {}

impl Loggable for ExecuteJobCmd {
    fn operation_type(&self) -> &str {
        "ExecuteJob"
    }
}

impl Command for ExecuteJobCmd {
    type Output = JobOutcome;

    fn execute(&self, ctx: &mut CommandContext) -> Result<JobOutcome> {
        let Some(job) = ctx.jobs().find_by_id(&self.job_id)? else {
            return Ok(JobOutcome::Skipped);
        };
        if job.lock_owner.as_deref() != Some(self.lock_owner.as_str()) {
            return Ok(JobOutcome::Skipped);
        }

        let handler = self.handlers.get(&job.job_type).ok_or_else(|| CommandError::JobFailure {
            job_id: job.id.clone(),
            message: format!("no handler registered for job type '{}'", job.job_type),
        })?;
        handler.execute(&job, ctx)?;

        ctx.jobs().delete(&job)?;
        Ok(JobOutcome::Completed)
    }
}

// ===== HandleJobFailure / UnlockJob =====

/// Record a failed execution: one retry fewer, lock released
///
/// Only applies while `lock_owner` still holds the job; a job re-acquired by
/// another owner in the meantime is left alone.
#[derive(Debug, Clone)]
pub struct HandleJobFailureCmd {
    pub job_id: String,
    pub lock_owner: String,
    pub message: String,
}

impl HandleJobFailureCmd {
    pub fn new(
        job_id: impl Into<String>,
        lock_owner: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            lock_owner: lock_owner.into(),
            message: message.into(),
        }
    }
}

impl Authorizable for HandleJobFailureCmd {}

impl Loggable for HandleJobFailureCmd {
    fn operation_type(&self) -> &str {
        "HandleJobFailure"
    }
}

impl Command for HandleJobFailureCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        let Some(mut job) = ctx.jobs().find_by_id(&self.job_id)? else {
            return Ok(());
        };
        if job.lock_owner.as_deref() != Some(self.lock_owner.as_str()) {
            tracing::debug!(
                component = module_path!(),
                job_id = %job.id,
                lock_owner = %self.lock_owner,
                "job no longer held; failure not recorded"
            );
            return Ok(());
        }
        job.retries = (job.retries - 1).max(0);
        job.exception_message = Some(self.message.clone());
        job.unlock();
        ctx.jobs().update(&job)
    }
}

#[derive(Debug, Clone)]
pub struct UnlockJobCmd {
    pub job_id: String,
}

impl UnlockJobCmd {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl Authorizable for UnlockJobCmd {}

impl Loggable for UnlockJobCmd {
    fn operation_type(&self) -> &str {
        "UnlockJob"
    }
}

impl Command for UnlockJobCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        if let Some(mut job) = ctx.jobs().find_by_id(&self.job_id)? {
            job.unlock();
            ctx.jobs().update(&job)?;
        }
        Ok(())
    }
}
