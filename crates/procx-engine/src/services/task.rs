use std::collections::BTreeMap;

use procx_core::commands::{ClaimTaskCmd, CompleteTaskCmd, CreateTaskCmd, GetTaskCmd};
use procx_core::errors::Result;
use procx_core::model::Task;
use procx_core::Authentication;
use serde_json::Value;

use crate::engine::ProcessEngine;

/// User tasks
#[derive(Clone)]
pub struct TaskService<'e> {
    engine: &'e ProcessEngine,
    authentication: Option<Authentication>,
}

impl<'e> TaskService<'e> {
    pub(crate) fn new(engine: &'e ProcessEngine, authentication: Option<Authentication>) -> Self {
        Self {
            engine,
            authentication,
        }
    }

    pub fn as_user(&self, authentication: Authentication) -> Self {
        Self::new(self.engine, Some(authentication))
    }

    pub fn create_task(&self, name: &str, process_instance_id: Option<&str>) -> Result<Task> {
        let mut cmd = CreateTaskCmd::new(name);
        if let Some(pi) = process_instance_id {
            cmd = cmd.for_process_instance(pi);
        }
        self.engine.run(&cmd, self.authentication.as_ref())
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task> {
        self.engine
            .run(&GetTaskCmd::new(task_id), self.authentication.as_ref())
    }

    pub fn claim(&self, task_id: &str, user_id: &str) -> Result<()> {
        self.engine.run(
            &ClaimTaskCmd::new(task_id, user_id),
            self.authentication.as_ref(),
        )
    }

    /// Complete the task, handing `variables` to its process instance
    pub fn complete(&self, task_id: &str, variables: BTreeMap<String, Value>) -> Result<()> {
        let mut cmd = CompleteTaskCmd::new(task_id);
        for (name, value) in variables {
            cmd = cmd.with_variable(name, value);
        }
        self.engine.run(&cmd, self.authentication.as_ref())
    }
}
