//! Task commands

use std::collections::BTreeMap;

use serde_json::Value;

use super::variables::SetVariableCmd;
use super::require_id;
use crate::authorization::{Permission, PermissionCheck, ResourceType, ANY};
use crate::command::{Authorizable, Command, Loggable};
use crate::context::operation_log::{
    OPERATION_TYPE_CLAIM, OPERATION_TYPE_COMPLETE, OPERATION_TYPE_CREATE,
};
use crate::context::CommandContext;
use crate::errors::{CommandError, Result};
use crate::model::{PropertyChange, Task};
use crate::persistence::EntityType;

#[derive(Debug, Clone)]
pub struct CreateTaskCmd {
    pub name: String,
    pub process_instance_id: Option<String>,
    pub assignee: Option<String>,
}

impl CreateTaskCmd {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            process_instance_id: None,
            assignee: None,
        }
    }

    pub fn for_process_instance(mut self, process_instance_id: impl Into<String>) -> Self {
        self.process_instance_id = Some(process_instance_id.into());
        self
    }
}

impl Authorizable for CreateTaskCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Create, ResourceType::Task, ANY)]
    }
}

impl Loggable for CreateTaskCmd {
    fn operation_type(&self) -> &str {
        "CreateTask"
    }
}

impl Command for CreateTaskCmd {
    type Output = Task;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Task> {
        require_id("name", &self.name)?;
        let mut task = Task::new(self.name.as_str(), ctx.now());
        if let Some(pi) = &self.process_instance_id {
            let execution = ctx.executions().get(pi)?;
            task.process_instance_id = Some(execution.id);
            task.suspension_state = execution.suspension_state;
        }
        task.assignee = self.assignee.clone();

        ctx.tasks().insert(&task)?;
        ctx.operation_log()
            .log_task_operation(OPERATION_TYPE_CREATE, &task, Vec::new());
        task.rev = 1;
        Ok(task)
    }
}

#[derive(Debug, Clone)]
pub struct GetTaskCmd {
    pub task_id: String,
}

impl GetTaskCmd {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }
}

impl Authorizable for GetTaskCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Read, ResourceType::Task, self.task_id.as_str())]
    }
}

impl Loggable for GetTaskCmd {
    fn operation_type(&self) -> &str {
        "GetTask"
    }
}

impl Command for GetTaskCmd {
    type Output = Task;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Task> {
        require_id("task_id", &self.task_id)?;
        ctx.tasks().get(&self.task_id)
    }
}

#[derive(Debug, Clone)]
pub struct ClaimTaskCmd {
    pub task_id: String,
    pub user_id: String,
}

impl ClaimTaskCmd {
    pub fn new(task_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl Authorizable for ClaimTaskCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Update, ResourceType::Task, self.task_id.as_str())]
    }
}

impl Loggable for ClaimTaskCmd {
    fn operation_type(&self) -> &str {
        "ClaimTask"
    }
}

impl Command for ClaimTaskCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        require_id("task_id", &self.task_id)?;
        require_id("user_id", &self.user_id)?;

        let mut task = ctx.tasks().get(&self.task_id)?;
        if task.suspension_state.is_suspended() {
            return Err(CommandError::business_rule(
                EntityType::Task,
                task.id.as_str(),
                "task is suspended",
            ));
        }
        match task.assignee.as_deref() {
            Some(current) if current == self.user_id => return Ok(()),
            Some(current) => {
                return Err(CommandError::business_rule(
                    EntityType::Task,
                    task.id.as_str(),
                    format!("task is already claimed by '{current}'"),
                ))
            }
            None => {}
        }

        task.assignee = Some(self.user_id.clone());
        ctx.tasks().update(&task)?;
        ctx.operation_log().log_task_operation(
            OPERATION_TYPE_CLAIM,
            &task,
            vec![PropertyChange::new(
                "assignee",
                None,
                Some(self.user_id.clone()),
            )],
        );
        Ok(())
    }
}

/// Complete a task, optionally handing variables to its process instance
#[derive(Debug, Clone)]
pub struct CompleteTaskCmd {
    pub task_id: String,
    pub variables: BTreeMap<String, Value>,
}

impl CompleteTaskCmd {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

impl Authorizable for CompleteTaskCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(Permission::Update, ResourceType::Task, self.task_id.as_str())]
    }
}

impl Loggable for CompleteTaskCmd {
    fn operation_type(&self) -> &str {
        "CompleteTask"
    }
}

impl Command for CompleteTaskCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        require_id("task_id", &self.task_id)?;
        let task = ctx.tasks().get(&self.task_id)?;
        if task.suspension_state.is_suspended() {
            return Err(CommandError::business_rule(
                EntityType::Task,
                task.id.as_str(),
                "task is suspended",
            ));
        }

        if !self.variables.is_empty() {
            let Some(pi) = task.process_instance_id.clone() else {
                return Err(CommandError::business_rule(
                    EntityType::Task,
                    task.id.as_str(),
                    "task has no process instance to receive variables",
                ));
            };
            // Covered by the task's own UPDATE check
            ctx.run_without_authorization(|ctx| {
                ctx.without_operation_log(|ctx| {
                    for (name, value) in &self.variables {
                        ctx.execute(&SetVariableCmd::new(pi.as_str(), name.as_str(), value.clone()))?;
                    }
                    Ok(())
                })
            })?;
        }

        ctx.tasks().delete(&task)?;
        ctx.operation_log().log_task_operation(
            OPERATION_TYPE_COMPLETE,
            &task,
            vec![PropertyChange::changed("delete", false, true)],
        );
        Ok(())
    }
}
