use procx_core::commands::{
    CreateJobCmd, DeleteJobCmd, GetJobCmd, ListJobsCmd, SetJobRetriesCmd,
};
use procx_core::errors::Result;
use procx_core::model::Job;
use procx_core::Authentication;

use crate::engine::ProcessEngine;
use crate::job_executor::JobRunReport;

/// Jobs and their execution
#[derive(Clone)]
pub struct ManagementService<'e> {
    engine: &'e ProcessEngine,
    authentication: Option<Authentication>,
}

impl<'e> ManagementService<'e> {
    pub(crate) fn new(engine: &'e ProcessEngine, authentication: Option<Authentication>) -> Self {
        Self {
            engine,
            authentication,
        }
    }

    pub fn as_user(&self, authentication: Authentication) -> Self {
        Self::new(self.engine, Some(authentication))
    }

    pub fn create_job(&self, cmd: &CreateJobCmd) -> Result<Job> {
        self.engine.run(cmd, self.authentication.as_ref())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job> {
        self.engine
            .run(&GetJobCmd::new(job_id), self.authentication.as_ref())
    }

    pub fn list_jobs(
        &self,
        process_instance_id: Option<&str>,
        job_type: Option<&str>,
    ) -> Result<Vec<Job>> {
        let cmd = ListJobsCmd {
            process_instance_id: process_instance_id.map(str::to_string),
            job_type: job_type.map(str::to_string),
        };
        self.engine.run(&cmd, self.authentication.as_ref())
    }

    pub fn set_job_retries(&self, job_id: &str, retries: i32) -> Result<()> {
        self.engine.run(
            &SetJobRetriesCmd::new(job_id, retries),
            self.authentication.as_ref(),
        )
    }

    pub fn delete_job(&self, job_id: &str) -> Result<()> {
        self.engine
            .run(&DeleteJobCmd::new(job_id), self.authentication.as_ref())
    }

    /// Acquire and execute due jobs until none are left
    ///
    /// Jobs always run as the system, whoever asks.
    pub fn execute_due_jobs(&self) -> Result<JobRunReport> {
        self.engine.job_executor().run_until_idle()
    }
}
