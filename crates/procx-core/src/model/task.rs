use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{db_entity, SuspensionState};
use crate::persistence::EntityType;

/// A user task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(skip)]
    pub rev: i64,
    pub name: String,
    pub process_instance_id: Option<String>,
    pub assignee: Option<String>,
    pub suspension_state: SuspensionState,
    pub created_at: DateTime<Utc>,
}

db_entity!(Task, EntityType::Task);

impl Task {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            rev: 0,
            name: name.into(),
            process_instance_id: None,
            assignee: None,
            suspension_state: SuspensionState::Active,
            created_at: now,
        }
    }
}
