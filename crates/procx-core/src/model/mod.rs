//! Persistent entities touched by commands

mod execution;
mod job;
mod operation_log;
mod task;
mod variable;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use execution::Execution;
pub use job::Job;
pub use operation_log::{OperationLogEntry, PropertyChange};
pub use task::Task;
pub use variable::Variable;

/// Suspension state of process instances, tasks and jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionState {
    #[default]
    Active,
    Suspended,
}

impl SuspensionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspensionState::Active => "ACTIVE",
            SuspensionState::Suspended => "SUSPENDED",
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, SuspensionState::Suspended)
    }
}

impl fmt::Display for SuspensionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implements [`DbEntity`](crate::persistence::DbEntity) for a struct with
/// `id: String` and `rev: i64` fields.
macro_rules! db_entity {
    ($ty:ty, $entity_type:expr) => {
        impl $crate::persistence::DbEntity for $ty {
            const ENTITY_TYPE: $crate::persistence::EntityType = $entity_type;

            fn id(&self) -> &str {
                &self.id
            }

            fn revision(&self) -> i64 {
                self.rev
            }

            fn set_revision(&mut self, rev: i64) {
                self.rev = rev;
            }
        }
    };
}

pub(crate) use db_entity;
