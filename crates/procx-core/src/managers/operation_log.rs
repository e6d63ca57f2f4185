use crate::context::operation_log::UserOperation;
use crate::context::CommandContext;
use crate::errors::Result;
use crate::model::{Execution, Job, OperationLogEntry, PropertyChange, Task};
use crate::persistence::{EntityQuery, EntityType};

/// Filters for reading the operation log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationLogQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub operation_type: Option<String>,
    pub user_id: Option<String>,
    pub process_instance_id: Option<String>,
}

impl OperationLogQuery {
    fn to_entity_query(&self) -> EntityQuery {
        let mut query = EntityQuery::of::<OperationLogEntry>();
        if let Some(entity_type) = self.entity_type {
            query = query.filter("entity_type", entity_type.as_str());
        }
        if let Some(id) = &self.entity_id {
            query = query.filter("entity_id", id.as_str());
        }
        if let Some(op) = &self.operation_type {
            query = query.filter("operation_type", op.as_str());
        }
        if let Some(user) = &self.user_id {
            query = query.filter("user_id", user.as_str());
        }
        if let Some(pi) = &self.process_instance_id {
            query = query.filter("process_instance_id", pi.as_str());
        }
        query
    }
}

/// Writes audit records for entity operations and reads them back
pub struct OperationLogManager<'c> {
    ctx: &'c mut CommandContext,
}

impl<'c> OperationLogManager<'c> {
    pub(crate) fn new(ctx: &'c mut CommandContext) -> Self {
        Self { ctx }
    }

    pub fn log_job_operation(
        &mut self,
        operation_type: &str,
        job: &Job,
        changes: Vec<PropertyChange>,
    ) {
        let mut op = UserOperation::new(operation_type, EntityType::Job)
            .entity_id(job.id.as_str())
            .process_instance_id(job.process_instance_id.clone());
        op.changes = changes;
        self.ctx.log_operation(op);
    }

    pub fn log_task_operation(
        &mut self,
        operation_type: &str,
        task: &Task,
        changes: Vec<PropertyChange>,
    ) {
        let mut op = UserOperation::new(operation_type, EntityType::Task)
            .entity_id(task.id.as_str())
            .process_instance_id(task.process_instance_id.clone());
        op.changes = changes;
        self.ctx.log_operation(op);
    }

    pub fn log_process_instance_operation(
        &mut self,
        operation_type: &str,
        execution: &Execution,
        changes: Vec<PropertyChange>,
    ) {
        let mut op = UserOperation::new(operation_type, EntityType::Execution)
            .entity_id(execution.id.as_str())
            .process_instance_id(Some(execution.id.clone()));
        op.changes = changes;
        self.ctx.log_operation(op);
    }

    pub fn log_variable_operation(
        &mut self,
        operation_type: &str,
        execution_id: &str,
        changes: Vec<PropertyChange>,
    ) {
        let mut op = UserOperation::new(operation_type, EntityType::Variable)
            .entity_id(execution_id)
            .process_instance_id(Some(execution_id.to_string()));
        op.changes = changes;
        self.ctx.log_operation(op);
    }

    /// Committed entries matching the query, oldest first
    pub fn list(&mut self, query: &OperationLogQuery) -> Result<Vec<OperationLogEntry>> {
        let mut entries: Vec<OperationLogEntry> = self.ctx.select_list(&query.to_entity_query())?;
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }
}
