//! Job executor: acquisition pass plus a scoped worker pool
//!
//! Each pass locks up to `max_jobs_per_acquisition` executable jobs for this
//! executor's lock owner, then `workers` threads execute them. A job whose
//! execution fails gets its failure recorded in a fresh transaction: one
//! retry fewer, the exception message kept, the lock released.

use std::collections::VecDeque;
use std::ops::AddAssign;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use procx_core::commands::{
    AcquireJobsCmd, ExecuteJobCmd, HandleJobFailureCmd, JobHandlerRegistry, JobOutcome,
};
use procx_core::errors::{CommandError, Result};
use procx_core::CommandExecutor;
use uuid::Uuid;

use crate::config::JobExecutorConfig;

/// What one or more passes did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobRunReport {
    pub acquired: usize,
    pub completed: usize,
    /// Vanished or re-locked by another owner before execution
    pub skipped: usize,
    pub failed: usize,
}

impl AddAssign for JobRunReport {
    fn add_assign(&mut self, other: Self) {
        self.acquired += other.acquired;
        self.completed += other.completed;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

pub struct JobExecutor {
    executor: CommandExecutor,
    handlers: Arc<JobHandlerRegistry>,
    config: JobExecutorConfig,
    lock_owner: String,
}

impl JobExecutor {
    pub fn new(
        executor: CommandExecutor,
        handlers: Arc<JobHandlerRegistry>,
        config: JobExecutorConfig,
    ) -> Self {
        let lock_owner = config
            .lock_owner
            .clone()
            .unwrap_or_else(|| format!("procx-{}", Uuid::new_v4()));
        Self {
            executor,
            handlers,
            config,
            lock_owner,
        }
    }

    pub fn lock_owner(&self) -> &str {
        &self.lock_owner
    }

    /// Lock executable jobs for this owner; ids of the jobs won
    pub fn acquire(&self) -> Result<Vec<String>> {
        let acquired = self.executor.execute(&AcquireJobsCmd::new(
            self.lock_owner.as_str(),
            chrono::Duration::seconds(self.config.lock_duration_secs),
            self.config.max_jobs_per_acquisition,
        ))?;
        Ok(acquired.job_ids())
    }

    /// One acquisition pass and the execution of everything it acquired
    pub fn run_once(&self) -> Result<JobRunReport> {
        let started = Instant::now();
        let job_ids = self.acquire()?;
        let mut report = JobRunReport {
            acquired: job_ids.len(),
            ..JobRunReport::default()
        };
        if job_ids.is_empty() {
            return Ok(report);
        }

        let queue = Mutex::new(VecDeque::from(job_ids));
        let workers = self.config.workers.min(report.acquired).max(1);

        let partials = thread::scope(|s| {
            let handles: Vec<_> = (0..workers).map(|_| s.spawn(|| self.drain(&queue))).collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| CommandError::internal("job worker panicked"))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        for partial in partials {
            report += partial;
        }

        tracing::info!(
            component = module_path!(),
            lock_owner = %self.lock_owner,
            acquired = report.acquired,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            duration_ms = started.elapsed().as_millis() as u64,
            "job pass finished"
        );
        Ok(report)
    }

    /// Repeat passes until an acquisition finds nothing
    pub fn run_until_idle(&self) -> Result<JobRunReport> {
        let mut total = JobRunReport::default();
        loop {
            let pass = self.run_once()?;
            if pass.acquired == 0 {
                return Ok(total);
            }
            total += pass;
        }
    }

    fn drain(&self, queue: &Mutex<VecDeque<String>>) -> JobRunReport {
        let mut report = JobRunReport::default();
        loop {
            let next = match queue.lock() {
                Ok(mut pending) => pending.pop_front(),
                Err(_) => None,
            };
            let Some(job_id) = next else {
                return report;
            };
            match self.execute(&job_id) {
                Ok(JobOutcome::Completed) => report.completed += 1,
                Ok(JobOutcome::Skipped) => report.skipped += 1,
                Err(_) => report.failed += 1,
            }
        }
    }

    fn execute(&self, job_id: &str) -> Result<JobOutcome> {
        let cmd = ExecuteJobCmd::new(job_id, self.lock_owner.as_str(), self.handlers.clone());
        match self.executor.execute(&cmd) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!(
                    component = module_path!(),
                    job_id = job_id,
                    err_code = err.code(),
                    error = %err,
                    "job execution failed"
                );
                let failure =
                    HandleJobFailureCmd::new(job_id, self.lock_owner.as_str(), err.to_string());
                if let Err(record_err) = self.executor.execute(&failure) {
                    tracing::error!(
                        component = module_path!(),
                        job_id = job_id,
                        error = %record_err,
                        "could not record job failure"
                    );
                }
                Err(err)
            }
        }
    }
}
