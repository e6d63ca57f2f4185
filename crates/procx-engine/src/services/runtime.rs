use std::collections::BTreeMap;

use procx_core::commands::{
    ActivateProcessInstanceCmd, DeleteProcessInstanceCmd, GetVariablesCmd, PatchVariablesCmd,
    RemoveVariableCmd, SetVariableCmd, StartProcessInstanceCmd, SuspendProcessInstanceCmd,
};
use procx_core::errors::Result;
use procx_core::model::Execution;
use procx_core::Authentication;
use serde_json::Value;

use crate::engine::ProcessEngine;

/// Process instances and their variables
#[derive(Clone)]
pub struct RuntimeService<'e> {
    engine: &'e ProcessEngine,
    authentication: Option<Authentication>,
}

impl<'e> RuntimeService<'e> {
    pub(crate) fn new(engine: &'e ProcessEngine, authentication: Option<Authentication>) -> Self {
        Self {
            engine,
            authentication,
        }
    }

    pub fn as_user(&self, authentication: Authentication) -> Self {
        Self::new(self.engine, Some(authentication))
    }

    pub fn start_process_instance(
        &self,
        process_definition_key: &str,
        business_key: Option<&str>,
        variables: BTreeMap<String, Value>,
    ) -> Result<Execution> {
        let mut cmd = StartProcessInstanceCmd::new(process_definition_key);
        if let Some(business_key) = business_key {
            cmd = cmd.with_business_key(business_key);
        }
        for (name, value) in variables {
            cmd = cmd.with_variable(name, value);
        }
        self.engine.run(&cmd, self.authentication.as_ref())
    }

    pub fn suspend_process_instance(&self, process_instance_id: &str) -> Result<()> {
        self.engine.run(
            &SuspendProcessInstanceCmd::new(process_instance_id),
            self.authentication.as_ref(),
        )
    }

    pub fn activate_process_instance(&self, process_instance_id: &str) -> Result<()> {
        self.engine.run(
            &ActivateProcessInstanceCmd::new(process_instance_id),
            self.authentication.as_ref(),
        )
    }

    pub fn delete_process_instance(
        &self,
        process_instance_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let mut cmd = DeleteProcessInstanceCmd::new(process_instance_id);
        if let Some(reason) = reason {
            cmd = cmd.with_reason(reason);
        }
        self.engine.run(&cmd, self.authentication.as_ref())
    }

    pub fn set_variable(&self, process_instance_id: &str, name: &str, value: Value) -> Result<()> {
        self.engine.run(
            &SetVariableCmd::new(process_instance_id, name, value),
            self.authentication.as_ref(),
        )
    }

    /// The removed value, if the variable existed
    pub fn remove_variable(&self, process_instance_id: &str, name: &str) -> Result<Option<Value>> {
        self.engine.run(
            &RemoveVariableCmd::new(process_instance_id, name),
            self.authentication.as_ref(),
        )
    }

    /// Apply all modifications and deletions in one transaction
    pub fn patch_variables(
        &self,
        process_instance_id: &str,
        modifications: BTreeMap<String, Value>,
        deletions: &[&str],
    ) -> Result<()> {
        let mut cmd = PatchVariablesCmd::new(process_instance_id);
        for (name, value) in modifications {
            cmd = cmd.set(name, value);
        }
        for name in deletions {
            cmd = cmd.remove(*name);
        }
        self.engine.run(&cmd, self.authentication.as_ref())
    }

    pub fn get_variables(&self, process_instance_id: &str) -> Result<BTreeMap<String, Value>> {
        self.engine.run(
            &GetVariablesCmd::new(process_instance_id),
            self.authentication.as_ref(),
        )
    }
}
