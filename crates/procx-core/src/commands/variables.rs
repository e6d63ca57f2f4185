//! Process-instance variable commands

use std::collections::BTreeMap;

use serde_json::Value;

use super::require_id;
use crate::authorization::{Permission, PermissionCheck, ResourceType};
use crate::command::{Authorizable, Command, Loggable};
use crate::context::operation_log::{
    OPERATION_TYPE_MODIFY_VARIABLE, OPERATION_TYPE_REMOVE_VARIABLE, OPERATION_TYPE_SET_VARIABLE,
};
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::PropertyChange;

fn update_instance(execution_id: &str) -> Vec<PermissionCheck> {
    vec![PermissionCheck::new(
        Permission::Update,
        ResourceType::ProcessInstance,
        execution_id,
    )]
}

#[derive(Debug, Clone)]
pub struct SetVariableCmd {
    pub execution_id: String,
    pub name: String,
    pub value: Value,
}

impl SetVariableCmd {
    pub fn new(execution_id: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        Self {
            execution_id: execution_id.into(),
            name: name.into(),
            value,
        }
    }
}

impl Authorizable for SetVariableCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        update_instance(&self.execution_id)
    }
}

impl Loggable for SetVariableCmd {
    fn operation_type(&self) -> &str {
        "SetVariable"
    }
}

impl Command for SetVariableCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        require_id("execution_id", &self.execution_id)?;
        require_id("name", &self.name)?;
        ctx.executions().get(&self.execution_id)?;

        let previous = ctx
            .variables()
            .set(&self.execution_id, &self.name, self.value.clone())?;
        ctx.operation_log().log_variable_operation(
            OPERATION_TYPE_SET_VARIABLE,
            &self.execution_id,
            vec![PropertyChange::new(
                self.name.as_str(),
                previous.map(|v| v.to_string()),
                Some(self.value.to_string()),
            )],
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RemoveVariableCmd {
    pub execution_id: String,
    pub name: String,
}

impl RemoveVariableCmd {
    pub fn new(execution_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            name: name.into(),
        }
    }
}

impl Authorizable for RemoveVariableCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        update_instance(&self.execution_id)
    }
}

impl Loggable for RemoveVariableCmd {
    fn operation_type(&self) -> &str {
        "RemoveVariable"
    }
}

impl Command for RemoveVariableCmd {
    /// The removed value, if the variable existed
    type Output = Option<Value>;

    fn execute(&self, ctx: &mut CommandContext) -> Result<Option<Value>> {
        require_id("execution_id", &self.execution_id)?;
        require_id("name", &self.name)?;
        ctx.executions().get(&self.execution_id)?;

        let removed = ctx.variables().remove(&self.execution_id, &self.name)?;
        if let Some(value) = &removed {
            ctx.operation_log().log_variable_operation(
                OPERATION_TYPE_REMOVE_VARIABLE,
                &self.execution_id,
                vec![PropertyChange::new(
                    self.name.as_str(),
                    Some(value.to_string()),
                    None,
                )],
            );
        }
        Ok(removed)
    }
}

/// Set and remove several variables as one audited operation
///
/// Modifications apply before deletions. A failing step rolls back the
/// whole patch.
#[derive(Debug, Clone, Default)]
pub struct PatchVariablesCmd {
    pub execution_id: String,
    pub modifications: BTreeMap<String, Value>,
    pub deletions: Vec<String>,
}

impl PatchVariablesCmd {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            ..Self::default()
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.modifications.insert(name.into(), value);
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.deletions.push(name.into());
        self
    }
}

impl Authorizable for PatchVariablesCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        update_instance(&self.execution_id)
    }
}

impl Loggable for PatchVariablesCmd {
    fn operation_type(&self) -> &str {
        "PatchVariables"
    }
}

impl Command for PatchVariablesCmd {
    type Output = ();

    fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        require_id("execution_id", &self.execution_id)?;
        let execution_id = self.execution_id.as_str();

        ctx.without_operation_log(|ctx| {
            for (name, value) in &self.modifications {
                ctx.execute(&SetVariableCmd::new(execution_id, name.as_str(), value.clone()))?;
            }
            for name in &self.deletions {
                ctx.execute(&RemoveVariableCmd::new(execution_id, name.as_str()))?;
            }
            Ok(())
        })?;

        ctx.operation_log().log_variable_operation(
            OPERATION_TYPE_MODIFY_VARIABLE,
            execution_id,
            Vec::new(),
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GetVariablesCmd {
    pub execution_id: String,
}

impl GetVariablesCmd {
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
        }
    }
}

impl Authorizable for GetVariablesCmd {
    fn authorization_checks(&self) -> Vec<PermissionCheck> {
        vec![PermissionCheck::new(
            Permission::Read,
            ResourceType::ProcessInstance,
            self.execution_id.as_str(),
        )]
    }
}

impl Loggable for GetVariablesCmd {
    fn operation_type(&self) -> &str {
        "GetVariables"
    }
}

impl Command for GetVariablesCmd {
    type Output = BTreeMap<String, Value>;

    fn execute(&self, ctx: &mut CommandContext) -> Result<BTreeMap<String, Value>> {
        require_id("execution_id", &self.execution_id)?;
        ctx.executions().get(&self.execution_id)?;
        ctx.variables().values(&self.execution_id)
    }
}
