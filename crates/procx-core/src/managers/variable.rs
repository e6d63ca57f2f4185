use std::collections::BTreeMap;

use serde_json::Value;

use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::Variable;
use crate::persistence::EntityQuery;

/// Variables of a process instance, addressed by name
pub struct VariableManager<'c> {
    ctx: &'c mut CommandContext,
}

impl<'c> VariableManager<'c> {
    pub(crate) fn new(ctx: &'c mut CommandContext) -> Self {
        Self { ctx }
    }

    pub fn find(&mut self, execution_id: &str, name: &str) -> Result<Option<Variable>> {
        self.ctx.find(&Variable::id_for(execution_id, name))
    }

    pub fn list(&mut self, execution_id: &str) -> Result<Vec<Variable>> {
        self.ctx
            .select_list(&EntityQuery::of::<Variable>().filter("execution_id", execution_id))
    }

    pub fn values(&mut self, execution_id: &str) -> Result<BTreeMap<String, Value>> {
        Ok(self
            .list(execution_id)?
            .into_iter()
            .map(|v| (v.name, v.value))
            .collect())
    }

    /// Create or overwrite; returns the previous value
    pub fn set(&mut self, execution_id: &str, name: &str, value: Value) -> Result<Option<Value>> {
        match self.find(execution_id, name)? {
            Some(mut existing) => {
                let previous = std::mem::replace(&mut existing.value, value);
                self.ctx.update(&existing)?;
                Ok(Some(previous))
            }
            None => {
                self.ctx.insert(&Variable::new(execution_id, name, value))?;
                Ok(None)
            }
        }
    }

    /// Remove if present; returns the removed value
    pub fn remove(&mut self, execution_id: &str, name: &str) -> Result<Option<Value>> {
        match self.find(execution_id, name)? {
            Some(existing) => {
                self.ctx.delete(&existing)?;
                Ok(Some(existing.value))
            }
            None => Ok(None),
        }
    }
}
