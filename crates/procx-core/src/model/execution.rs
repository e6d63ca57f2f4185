use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{db_entity, SuspensionState};
use crate::persistence::EntityType;

/// A process instance record
///
/// Only the state the command layer needs; model interpretation lives
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    #[serde(skip)]
    pub rev: i64,
    pub process_definition_key: String,
    pub business_key: Option<String>,
    pub suspension_state: SuspensionState,
    pub start_time: DateTime<Utc>,
}

db_entity!(Execution, EntityType::Execution);

impl Execution {
    pub fn new(process_definition_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            rev: 0,
            process_definition_key: process_definition_key.into(),
            business_key: None,
            suspension_state: SuspensionState::Active,
            start_time: now,
        }
    }
}
