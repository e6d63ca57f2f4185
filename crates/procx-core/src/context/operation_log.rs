//! Operation-log (audit) buffer owned by a command context
//!
//! Entries are collected while the command runs and written as inserts in
//! the same flush as the business changes, so both commit or neither does.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use procx_core_types::OperationId;

use crate::errors::Result;
use crate::model::{OperationLogEntry, PropertyChange};
use crate::persistence::{DbOperation, EntityType};

pub const OPERATION_TYPE_CREATE: &str = "Create";
pub const OPERATION_TYPE_DELETE: &str = "Delete";
pub const OPERATION_TYPE_CLAIM: &str = "Claim";
pub const OPERATION_TYPE_COMPLETE: &str = "Complete";
pub const OPERATION_TYPE_SUSPEND: &str = "Suspend";
pub const OPERATION_TYPE_ACTIVATE: &str = "Activate";
pub const OPERATION_TYPE_SET_JOB_RETRIES: &str = "SetJobRetries";
pub const OPERATION_TYPE_SET_VARIABLE: &str = "SetVariable";
pub const OPERATION_TYPE_REMOVE_VARIABLE: &str = "RemoveVariable";
pub const OPERATION_TYPE_MODIFY_VARIABLE: &str = "ModifyVariable";

/// One user operation to be audited, possibly touching several properties
#[derive(Debug, Clone, PartialEq)]
pub struct UserOperation {
    pub operation_type: String,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub process_instance_id: Option<String>,
    pub changes: Vec<PropertyChange>,
}

impl UserOperation {
    pub fn new(operation_type: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            operation_type: operation_type.into(),
            entity_type,
            entity_id: None,
            process_instance_id: None,
            changes: Vec::new(),
        }
    }

    pub fn entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn process_instance_id(mut self, id: Option<String>) -> Self {
        self.process_instance_id = id;
        self
    }

    pub fn change(mut self, change: PropertyChange) -> Self {
        self.changes.push(change);
        self
    }
}

/// Pending audit entries of one attempt
#[derive(Debug, Default)]
pub struct OperationLogBuffer {
    entries: Vec<OperationLogEntry>,
}

impl OperationLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand an operation into one entry per property change
    pub fn record(
        &mut self,
        operation: UserOperation,
        user_id: Option<String>,
        now: DateTime<Utc>,
    ) {
        let operation_id = OperationId::new();
        let changes = if operation.changes.is_empty() {
            vec![PropertyChange::empty()]
        } else {
            operation.changes
        };

        for change in changes {
            self.entries.push(OperationLogEntry {
                id: Uuid::now_v7().to_string(),
                rev: 1,
                operation_id: operation_id.to_string(),
                operation_type: operation.operation_type.clone(),
                entity_type: operation.entity_type,
                entity_id: operation.entity_id.clone(),
                property: change.property,
                org_value: change.org_value,
                new_value: change.new_value,
                user_id: user_id.clone(),
                timestamp: now,
                process_instance_id: operation.process_instance_id.clone(),
            });
        }
    }

    pub fn entries(&self) -> &[OperationLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turn the buffered entries into inserts, leaving the buffer empty
    pub fn drain_operations(&mut self) -> Result<Vec<DbOperation>> {
        self.entries
            .drain(..)
            .map(|entry| {
                Ok(DbOperation::Insert {
                    entity_type: EntityType::OperationLog,
                    id: entry.id.clone(),
                    rev: 1,
                    state: serde_json::to_value(&entry)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_entry_per_change_sharing_operation_id() {
        let mut buffer = OperationLogBuffer::new();
        buffer.record(
            UserOperation::new(OPERATION_TYPE_CLAIM, EntityType::Task)
                .entity_id("t-1")
                .change(PropertyChange::new("assignee", None, Some("kim".to_string())))
                .change(PropertyChange::changed("priority", 50, 80)),
            Some("kim".to_string()),
            Utc::now(),
        );

        let entries = buffer.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation_id, entries[1].operation_id);
        assert_ne!(entries[0].id, entries[1].id);
        assert_eq!(entries[1].org_value.as_deref(), Some("50"));
    }

    #[test]
    fn test_operation_without_changes_logs_once() {
        let mut buffer = OperationLogBuffer::new();
        buffer.record(
            UserOperation::new(OPERATION_TYPE_DELETE, EntityType::Job).entity_id("job-1"),
            None,
            Utc::now(),
        );

        assert_eq!(buffer.len(), 1);
        assert!(buffer.entries()[0].property.is_none());
    }

    #[test]
    fn test_drain_produces_inserts() {
        let mut buffer = OperationLogBuffer::new();
        buffer.record(
            UserOperation::new(OPERATION_TYPE_DELETE, EntityType::Job).entity_id("job-1"),
            None,
            Utc::now(),
        );

        let ops = buffer.drain_operations().unwrap();

        assert!(buffer.is_empty());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].entity_type(), EntityType::OperationLog);
        assert_eq!(ops[0].label(), "insert");
    }
}
