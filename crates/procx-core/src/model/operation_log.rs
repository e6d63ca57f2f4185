use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::db_entity;
use crate::persistence::EntityType;

/// One changed property of an audited operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub property: Option<String>,
    pub org_value: Option<String>,
    pub new_value: Option<String>,
}

impl PropertyChange {
    pub fn new(
        property: impl Into<String>,
        org_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            property: Some(property.into()),
            org_value,
            new_value,
        }
    }

    /// A property that had a value before and after the operation
    pub fn changed(property: impl Into<String>, org: impl ToString, new: impl ToString) -> Self {
        Self::new(property, Some(org.to_string()), Some(new.to_string()))
    }

    /// An operation recorded without property detail
    pub fn empty() -> Self {
        Self {
            property: None,
            org_value: None,
            new_value: None,
        }
    }
}

/// Immutable audit record written in the same flush as the change it describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub id: String,
    #[serde(skip)]
    pub rev: i64,
    /// Shared by all entries of one logged operation
    pub operation_id: String,
    pub operation_type: String,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub property: Option<String>,
    pub org_value: Option<String>,
    pub new_value: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub process_instance_id: Option<String>,
}

db_entity!(OperationLogEntry, EntityType::OperationLog);
