//! Command catalogue
//!
//! Concrete commands over jobs, tasks, process instances, variables and the
//! operation log. Each one validates its parameters before loading anything,
//! declares its permission checks up front and records its audit entries
//! through the context.

mod job;
mod operation_log;
mod process_instance;
mod task;
mod variables;

use crate::errors::{CommandError, Result};

pub use job::{
    AcquireJobsCmd, AcquiredJobs, CreateJobCmd, DeleteJobCmd, ExecuteJobCmd, GetJobCmd,
    HandleJobFailureCmd, JobHandler, JobHandlerRegistry, JobOutcome, ListJobsCmd,
    SetJobRetriesCmd, UnlockJobCmd,
};
pub use operation_log::ListOperationLogCmd;
pub use process_instance::{
    ActivateProcessInstanceCmd, DeleteProcessInstanceCmd, StartProcessInstanceCmd,
    SuspendProcessInstanceCmd,
};
pub use task::{ClaimTaskCmd, CompleteTaskCmd, CreateTaskCmd, GetTaskCmd};
pub use variables::{GetVariablesCmd, PatchVariablesCmd, RemoveVariableCmd, SetVariableCmd};

pub(crate) fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CommandError::validation(field, "must not be empty"));
    }
    Ok(())
}
