//! Persistence contracts between the command core and a storage backend
//!
//! The core never issues SQL. Entities travel as [`EntityRow`]s (id, revision
//! and a JSON state document) and mutations are described as
//! [`DbOperation`]s that a [`PersistenceSession`] executes in order at flush.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CommandError, Result};

pub use memory::InMemoryStore;

/// Kinds of persistent entity, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Job,
    Task,
    /// A process instance
    Execution,
    Variable,
    OperationLog,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Job,
        EntityType::Task,
        EntityType::Execution,
        EntityType::Variable,
        EntityType::OperationLog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Job => "job",
            EntityType::Task => "task",
            EntityType::Execution => "execution",
            EntityType::Variable => "variable",
            EntityType::OperationLog => "operation_log",
        }
    }

    /// Backing table name
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Job => "jobs",
            EntityType::Task => "tasks",
            EntityType::Execution => "executions",
            EntityType::Variable => "variables",
            EntityType::OperationLog => "operation_log",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityType::Job => "Job",
            EntityType::Task => "Task",
            EntityType::Execution => "ProcessInstance",
            EntityType::Variable => "Variable",
            EntityType::OperationLog => "OperationLog",
        };
        f.write_str(label)
    }
}

impl FromStr for EntityType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "job" => Ok(EntityType::Job),
            "task" => Ok(EntityType::Task),
            "execution" | "processinstance" | "process_instance" => Ok(EntityType::Execution),
            "variable" => Ok(EntityType::Variable),
            "operation_log" | "operationlog" => Ok(EntityType::OperationLog),
            other => Err(CommandError::validation(
                "entity_type",
                format!("unknown entity type '{other}'"),
            )),
        }
    }
}

/// A typed entity that can live in the entity cache
///
/// The revision is owned by the persistence layer and is not part of the
/// serialized state; implementors mark the field `#[serde(skip)]`.
pub trait DbEntity: Clone + Serialize + DeserializeOwned + Send + 'static {
    const ENTITY_TYPE: EntityType;

    fn id(&self) -> &str;
    fn revision(&self) -> i64;
    fn set_revision(&mut self, rev: i64);
}

/// A stored row: identity, revision and JSON state
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub entity_type: EntityType,
    pub id: String,
    pub rev: i64,
    pub state: Value,
}

impl EntityRow {
    pub fn from_entity<T: DbEntity>(entity: &T) -> Result<Self> {
        Ok(Self {
            entity_type: T::ENTITY_TYPE,
            id: entity.id().to_string(),
            rev: entity.revision(),
            state: serde_json::to_value(entity)?,
        })
    }

    pub fn into_entity<T: DbEntity>(self) -> Result<T> {
        let mut entity: T = serde_json::from_value(self.state)?;
        entity.set_revision(self.rev);
        Ok(entity)
    }
}

/// Equality filters over top-level state fields, evaluated with AND
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    pub entity_type: EntityType,
    pub filters: Vec<(String, Value)>,
}

impl EntityQuery {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            filters: Vec::new(),
        }
    }

    pub fn of<T: DbEntity>() -> Self {
        Self::new(T::ENTITY_TYPE)
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// A missing field matches a `null` filter value.
    pub fn matches(&self, state: &Value) -> bool {
        self.filters.iter().all(|(field, expected)| {
            state.get(field).unwrap_or(&Value::Null) == expected
        })
    }
}

/// A versioned mutation executed at flush
#[derive(Debug, Clone, PartialEq)]
pub enum DbOperation {
    Insert {
        entity_type: EntityType,
        id: String,
        rev: i64,
        state: Value,
    },
    /// Applies only if the stored revision still equals `expected_rev`
    Update {
        entity_type: EntityType,
        id: String,
        expected_rev: i64,
        new_rev: i64,
        state: Value,
    },
    /// Applies only if the stored revision still equals `expected_rev`
    Delete {
        entity_type: EntityType,
        id: String,
        expected_rev: i64,
    },
}

impl DbOperation {
    pub fn entity_type(&self) -> EntityType {
        match self {
            DbOperation::Insert { entity_type, .. }
            | DbOperation::Update { entity_type, .. }
            | DbOperation::Delete { entity_type, .. } => *entity_type,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DbOperation::Insert { id, .. }
            | DbOperation::Update { id, .. }
            | DbOperation::Delete { id, .. } => id,
        }
    }

    pub fn expected_rev(&self) -> Option<i64> {
        match self {
            DbOperation::Insert { .. } => None,
            DbOperation::Update { expected_rev, .. } | DbOperation::Delete { expected_rev, .. } => {
                Some(*expected_rev)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DbOperation::Insert { .. } => "insert",
            DbOperation::Update { .. } => "update",
            DbOperation::Delete { .. } => "delete",
        }
    }
}

/// Why a single operation did not apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationFailure {
    /// Update or delete matched no row at the expected revision
    RevisionMismatch,
    /// Insert collided with an existing id
    DuplicateKey,
}

/// Outcome of executing a batch of operations
///
/// Operations before `index` were applied; nothing at or after it was.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushResult {
    Applied,
    Failed {
        index: usize,
        failure: OperationFailure,
    },
}

/// Convert a failed operation into the retryable error surfaced to callers
pub fn lock_error(op: &DbOperation) -> CommandError {
    CommandError::OptimisticLock {
        entity_type: op.entity_type(),
        id: op.id().to_string(),
        expected_revision: op.expected_rev(),
    }
}

/// One transaction against the backing store
///
/// Sessions are created per attempt and never shared between threads while
/// in use.
pub trait PersistenceSession: Send {
    fn begin(&mut self) -> Result<()>;

    fn select_by_id(&mut self, entity_type: EntityType, id: &str) -> Result<Option<EntityRow>>;

    /// Rows matching the query, ordered by id
    fn select_list(&mut self, query: &EntityQuery) -> Result<Vec<EntityRow>>;

    /// Execute operations in order, stopping at the first one that fails
    fn execute_operations(&mut self, ops: &[DbOperation]) -> Result<FlushResult>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Opens sessions against a shared store
pub trait SessionFactory: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn PersistenceSession>>;
}
