use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::db_entity;
use crate::persistence::EntityType;

/// A named value scoped to a process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// `{execution_id}/{name}`
    pub id: String,
    #[serde(skip)]
    pub rev: i64,
    pub execution_id: String,
    pub name: String,
    pub value: Value,
}

db_entity!(Variable, EntityType::Variable);

impl Variable {
    pub fn new(execution_id: impl Into<String>, name: impl Into<String>, value: Value) -> Self {
        let execution_id = execution_id.into();
        let name = name.into();
        Self {
            id: Self::id_for(&execution_id, &name),
            rev: 0,
            execution_id,
            name,
            value,
        }
    }

    pub fn id_for(execution_id: &str, name: &str) -> String {
        format!("{execution_id}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_is_scoped_to_execution() {
        let var = Variable::new("pi-1", "amount", json!(42));
        assert_eq!(var.id, "pi-1/amount");
        assert_eq!(Variable::id_for("pi-2", "amount"), "pi-2/amount");
    }
}
