//! Process instance commands
//!
//! A process instance here is just its execution record, its variables and
//! the tasks and jobs pointing at it. Nothing interprets a process model.

use std::collections::BTreeMap;

use serde_json::Value;

use super::require_id;
use super::variables::RemoveVariableCmd;
use crate::authorization::{Permission, PermissionCheck, ResourceType, ANY};
use crate::command::{Authorizable, Command, Loggable};
use crate::context::operation_log::{
    OPERATION_TYPE_ACTIVATE, OPERATION_TYPE_CREATE, OPERATION_TYPE_DELETE, OPERATION_TYPE_SUSPEND,
};
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::{Execution, PropertyChange, SuspensionState};

#[derive(Debug, Clone)]
pub struct StartProcessInstanceCmd {
    pub process_definition_key: String,
    pub business_key: Option<String>,
    pub variables: BTreeMap<String, Value>,
}

impl StartProcessInstanceCmd {
    pub fn new(process_definition_key: impl Into<String>) -> Self {
        Self {
            process_definition_key: process_definition_key.into(),
            business_key: None,
            variables: BTreeMap::new(),
        }
    }

    pub fn with_business_key(mut self, business_key: impl Into<String>) -> Self {
        self.business_key = Some(business_key.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

impl Authorizable for StartProcessInstanceCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(
            Permission::Create,
            ResourceType::ProcessInstance,
            ANY,
        )]
    }
}

impl Loggable for StartProcessInstanceCmd {
    fn operation_type(&self) -> &str {
        "StartProcessInstance"
    }
}

impl Command for StartProcessInstanceCmd {
    type Output = Execution;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Execution> {
        require_id("process_definition_key", &self.process_definition_key)?;
        for name in self.variables.keys() {
            require_id("variables", name)?;
        }

        let mut execution = Execution::new(self.process_definition_key.as_str(), ctx.now());
        execution.business_key = self.business_key.clone();
        ctx.executions().insert(&execution)?;
        for (name, value) in &self.variables {
            ctx.variables().set(&execution.id, name, value.clone())?;
        }

        ctx.operation_log().log_process_instance_operation(
            OPERATION_TYPE_CREATE,
            &execution,
            Vec::new(),
        );
        execution.rev = 1;
        Ok(execution)
    }
}

/// Move an instance and everything hanging off it to `target`
fn change_suspension_state(
    ctx: &mut CommandContext,
    process_instance_id: &str,
    target: SuspensionState,
    operation_type: &str,
) -> Result<()> {
    require_id("process_instance_id", process_instance_id)?;
    let mut execution = ctx.executions().get(process_instance_id)?;
    let previous = execution.suspension_state;
    if previous == target {
        return Ok(());
    }

    execution.suspension_state = target;
    ctx.executions().update(&execution)?;

    for mut task in ctx.tasks().find_by_process_instance(process_instance_id)? {
        task.suspension_state = target;
        ctx.tasks().update(&task)?;
    }
    for mut job in ctx.jobs().find_by_process_instance(process_instance_id)? {
        job.suspension_state = target;
        ctx.jobs().update(&job)?;
    }

    ctx.operation_log().log_process_instance_operation(
        operation_type,
        &execution,
        vec![PropertyChange::changed(
            "suspensionState",
            previous.as_str(),
            target.as_str(),
        )],
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SuspendProcessInstanceCmd {
    pub process_instance_id: String,
}

impl SuspendProcessInstanceCmd {
    pub fn new(process_instance_id: impl Into<String>) -> Self {
        Self {
            process_instance_id: process_instance_id.into(),
        }
    }
}

impl Authorizable for SuspendProcessInstanceCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(
            Permission::Update,
            ResourceType::ProcessInstance,
            self.process_instance_id.as_str(),
        )]
    }
}

impl Loggable for SuspendProcessInstanceCmd {
    fn operation_type(&self) -> &str {
        "SuspendProcessInstance"
    }
}

impl Command for SuspendProcessInstanceCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        change_suspension_state(
            ctx,
            &self.process_instance_id,
            SuspensionState::Suspended,
            OPERATION_TYPE_SUSPEND,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ActivateProcessInstanceCmd {
    pub process_instance_id: String,
}

impl ActivateProcessInstanceCmd {
    pub fn new(process_instance_id: impl Into<String>) -> Self {
        Self {
            process_instance_id: process_instance_id.into(),
        }
    }
}

impl Authorizable for ActivateProcessInstanceCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(
            Permission::Update,
            ResourceType::ProcessInstance,
            self.process_instance_id.as_str(),
        )]
    }
}

impl Loggable for ActivateProcessInstanceCmd {
    fn operation_type(&self) -> &str {
        "ActivateProcessInstance"
    }
}

impl Command for ActivateProcessInstanceCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        change_suspension_state(
            ctx,
            &self.process_instance_id,
            SuspensionState::Active,
            OPERATION_TYPE_ACTIVATE,
        )
    }
}

/// Delete an instance with its variables, tasks and jobs
#[derive(Debug, Clone)]
pub struct DeleteProcessInstanceCmd {
    pub process_instance_id: String,
    pub reason: Option<String>,
}

impl DeleteProcessInstanceCmd {
    pub fn new(process_instance_id: impl Into<String>) -> Self {
        Self {
            process_instance_id: process_instance_id.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl Authorizable for DeleteProcessInstanceCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(
            Permission::Delete,
            ResourceType::ProcessInstance,
            self.process_instance_id.as_str(),
        )]
    }
}

impl Loggable for DeleteProcessInstanceCmd {
    fn operation_type(&self) -> &str {
        "DeleteProcessInstance"
    }
}

impl Command for DeleteProcessInstanceCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        let pi = self.process_instance_id.as_str();
        require_id("process_instance_id", pi)?;
        let execution = ctx.executions().get(pi)?;

        let names: Vec<String> = ctx
            .variables()
            .list(pi)?
            .into_iter()
            .map(|v| v.name)
            .collect();
        // DELETE on the instance already covers its variables
        ctx.run_without_authorization(|ctx| {
            ctx.without_operation_log(|ctx| {
                for name in &names {
                    ctx.execute(&RemoveVariableCmd::new(pi, name.as_str()))?;
                }
                Ok(())
            })
        })?;

        for task in ctx.tasks().find_by_process_instance(pi)? {
            ctx.tasks().delete(&task)?;
        }
        for job in ctx.jobs().find_by_process_instance(pi)? {
            ctx.jobs().delete(&job)?;
        }
        ctx.executions().delete(&execution)?;

        let changes = match &self.reason {
            Some(reason) => vec![PropertyChange::new("reason", None, Some(reason.clone()))],
            None => Vec::new(),
        };
        ctx.operation_log()
            .log_process_instance_operation(OPERATION_TYPE_DELETE, &execution, changes);
        Ok(())
    }
}
