//! Entity managers
//!
//! Managers are short-lived views borrowed from a [`CommandContext`]. They
//! hold no state of their own; reads go through the context's entity cache
//! and writes are queued in its unit of work.

mod execution;
mod job;
mod operation_log;
mod task;
mod variable;

use crate::context::CommandContext;

pub use execution::ExecutionManager;
pub use job::JobManager;
pub use operation_log::{OperationLogManager, OperationLogQuery};
pub use task::TaskManager;
pub use variable::VariableManager;

impl CommandContext {
    pub fn jobs(&mut self) -> JobManager<'_> {
        JobManager::new(self)
    }

    pub fn tasks(&mut self) -> TaskManager<'_> {
        TaskManager::new(self)
    }

    pub fn executions(&mut self) -> ExecutionManager<'_> {
        ExecutionManager::new(self)
    }

    pub fn variables(&mut self) -> VariableManager<'_> {
        VariableManager::new(self)
    }

    pub fn operation_log(&mut self) -> OperationLogManager<'_> {
        OperationLogManager::new(self)
    }
}
