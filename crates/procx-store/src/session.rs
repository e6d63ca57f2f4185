//! SQLite-backed persistence sessions
//!
//! Each session owns its own connection and runs one deferred transaction.
//! Updates and deletes carry the expected revision in their `WHERE` clause;
//! a statement that touches no row is reported back as a failed operation so
//! the core can raise an optimistic-lock conflict.

use std::path::{Path, PathBuf};
use std::time::Duration;

use procx_core::errors::CommandError;
use procx_core::persistence::{
    DbOperation, EntityQuery, EntityRow, EntityType, FlushResult, OperationFailure,
    PersistenceSession, SessionFactory,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;

use crate::db;
use crate::errors::{from_rusqlite, is_unique_violation, Result};
use crate::migrations::apply_migrations;

/// Opens one connection per session against a database file
#[derive(Debug, Clone)]
pub struct SqliteSessionFactory {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteSessionFactory {
    /// Open the database, creating it if needed, and apply pending migrations
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut conn = db::open(&path)?;
        apply_migrations(&mut conn)?;
        tracing::debug!(
            component = module_path!(),
            path = %path.display(),
            "sqlite store ready"
        );
        Ok(Self {
            path,
            busy_timeout: db::DEFAULT_BUSY_TIMEOUT,
        })
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh connection to the same database, outside any session
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(from_rusqlite)?;
        db::configure(&conn, self.busy_timeout)?;
        Ok(conn)
    }
}

impl SessionFactory for SqliteSessionFactory {
    fn open_session(&self) -> Result<Box<dyn PersistenceSession>> {
        Ok(Box::new(SqliteSession::new(self.connect()?)))
    }
}

/// One transaction on one connection
pub struct SqliteSession {
    conn: Connection,
    in_tx: bool,
}

impl SqliteSession {
    pub fn new(conn: Connection) -> Self {
        Self { conn, in_tx: false }
    }

    fn ensure_tx(&mut self) -> Result<()> {
        if !self.in_tx {
            self.begin()?;
        }
        Ok(())
    }

    fn apply(&self, op: &DbOperation) -> Result<Option<OperationFailure>> {
        let table = op.entity_type().table_name();
        match op {
            DbOperation::Insert { id, rev, state, .. } => {
                let sql = format!("INSERT INTO {table} (id, rev, state) VALUES (?1, ?2, ?3)");
                match self
                    .conn
                    .execute(&sql, params![id, rev, state.to_string()])
                {
                    Ok(_) => Ok(None),
                    Err(err) if is_unique_violation(&err) => {
                        Ok(Some(OperationFailure::DuplicateKey))
                    }
                    Err(err) => Err(from_rusqlite(err)),
                }
            }
            DbOperation::Update {
                id,
                expected_rev,
                new_rev,
                state,
                ..
            } => {
                let sql = format!("UPDATE {table} SET rev = ?1, state = ?2 WHERE id = ?3 AND rev = ?4");
                let changed = self
                    .conn
                    .execute(&sql, params![new_rev, state.to_string(), id, expected_rev])
                    .map_err(from_rusqlite)?;
                Ok((changed == 0).then_some(OperationFailure::RevisionMismatch))
            }
            DbOperation::Delete {
                id, expected_rev, ..
            } => {
                let sql = format!("DELETE FROM {table} WHERE id = ?1 AND rev = ?2");
                let changed = self
                    .conn
                    .execute(&sql, params![id, expected_rev])
                    .map_err(from_rusqlite)?;
                Ok((changed == 0).then_some(OperationFailure::RevisionMismatch))
            }
        }
    }
}

impl PersistenceSession for SqliteSession {
    fn begin(&mut self) -> Result<()> {
        if self.in_tx {
            self.rollback()?;
        }
        self.conn.execute_batch("BEGIN").map_err(from_rusqlite)?;
        self.in_tx = true;
        Ok(())
    }

    fn select_by_id(&mut self, entity_type: EntityType, id: &str) -> Result<Option<EntityRow>> {
        self.ensure_tx()?;
        let sql = format!(
            "SELECT rev, state FROM {} WHERE id = ?1",
            entity_type.table_name()
        );
        let found: Option<(i64, String)> = self
            .conn
            .query_row(&sql, [id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(from_rusqlite)?;

        found
            .map(|(rev, state)| {
                Ok(EntityRow {
                    entity_type,
                    id: id.to_string(),
                    rev,
                    state: serde_json::from_str(&state)?,
                })
            })
            .transpose()
    }

    fn select_list(&mut self, query: &EntityQuery) -> Result<Vec<EntityRow>> {
        self.ensure_tx()?;
        let (sql, bindings) = list_sql(query)?;
        let mut stmt = self.conn.prepare(&sql).map_err(from_rusqlite)?;
        let raw = stmt
            .query_map(params_from_iter(bindings.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        raw.into_iter()
            .map(|(id, rev, state)| {
                Ok(EntityRow {
                    entity_type: query.entity_type,
                    id,
                    rev,
                    state: serde_json::from_str(&state)?,
                })
            })
            .collect()
    }

    fn execute_operations(&mut self, ops: &[DbOperation]) -> Result<FlushResult> {
        self.ensure_tx()?;
        for (index, op) in ops.iter().enumerate() {
            if let Some(failure) = self.apply(op)? {
                tracing::debug!(
                    component = module_path!(),
                    entity_type = op.entity_type().as_str(),
                    entity_id = op.id(),
                    operation = op.label(),
                    ?failure,
                    "operation did not apply"
                );
                return Ok(FlushResult::Failed { index, failure });
            }
        }
        Ok(FlushResult::Applied)
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_tx {
            return Ok(());
        }
        self.conn.execute_batch("COMMIT").map_err(from_rusqlite)?;
        self.in_tx = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;
        // a failed COMMIT may already have ended the transaction
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK").map_err(from_rusqlite)
    }
}

/// Build the list query; filters compare top-level JSON fields
fn list_sql(query: &EntityQuery) -> Result<(String, Vec<SqlValue>)> {
    let mut sql = format!(
        "SELECT id, rev, state FROM {}",
        query.entity_type.table_name()
    );
    let mut clauses = Vec::with_capacity(query.filters.len());
    let mut bindings = Vec::with_capacity(query.filters.len());

    for (field, value) in &query.filters {
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CommandError::validation(
                "filter",
                format!("invalid field name '{field}'"),
            ));
        }
        let path = format!("json_extract(state, '$.{field}')");
        match to_sql_value(value)? {
            None => clauses.push(format!("{path} IS NULL")),
            Some(bound) => {
                clauses.push(format!("{path} = ?"));
                bindings.push(bound);
            }
        }
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY id");
    Ok((sql, bindings))
}

/// `json_extract` yields SQL scalars; booleans come back as 0/1
fn to_sql_value(value: &Value) -> Result<Option<SqlValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(SqlValue::Integer(i64::from(*b)))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(SqlValue::Integer(i))),
            None => Ok(Some(SqlValue::Real(n.as_f64().unwrap_or_default()))),
        },
        Value::String(s) => Ok(Some(SqlValue::Text(s.clone()))),
        Value::Array(_) | Value::Object(_) => Err(CommandError::validation(
            "filter",
            "only scalar values can be filtered on",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn factory() -> (TempDir, SqliteSessionFactory) {
        let dir = TempDir::new().unwrap();
        let factory = SqliteSessionFactory::open(dir.path().join("procx.db")).unwrap();
        (dir, factory)
    }

    fn insert(id: &str, state: Value) -> DbOperation {
        DbOperation::Insert {
            entity_type: EntityType::Job,
            id: id.to_string(),
            rev: 1,
            state,
        }
    }

    #[test]
    fn test_insert_then_select_after_commit() {
        let (_dir, factory) = factory();
        let mut session = factory.open_session().unwrap();
        session.begin().unwrap();
        let result = session
            .execute_operations(&[insert("job-1", json!({ "retries": 3 }))])
            .unwrap();
        assert_eq!(result, FlushResult::Applied);
        session.commit().unwrap();

        let mut reader = factory.open_session().unwrap();
        reader.begin().unwrap();
        let row = reader.select_by_id(EntityType::Job, "job-1").unwrap().unwrap();
        assert_eq!(row.rev, 1);
        assert_eq!(row.state["retries"], 3);
    }

    #[test]
    fn test_stale_update_reports_revision_mismatch() {
        let (_dir, factory) = factory();
        let mut session = factory.open_session().unwrap();
        session.begin().unwrap();
        session
            .execute_operations(&[insert("job-1", json!({}))])
            .unwrap();
        session.commit().unwrap();

        session.begin().unwrap();
        let stale = DbOperation::Update {
            entity_type: EntityType::Job,
            id: "job-1".to_string(),
            expected_rev: 7,
            new_rev: 8,
            state: json!({}),
        };
        let result = session
            .execute_operations(&[insert("job-2", json!({})), stale])
            .unwrap();
        assert_eq!(
            result,
            FlushResult::Failed {
                index: 1,
                failure: OperationFailure::RevisionMismatch
            }
        );
        session.rollback().unwrap();

        let mut reader = factory.open_session().unwrap();
        assert!(reader.select_by_id(EntityType::Job, "job-2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_is_reported() {
        let (_dir, factory) = factory();
        let mut session = factory.open_session().unwrap();
        session.begin().unwrap();
        let result = session
            .execute_operations(&[insert("job-1", json!({})), insert("job-1", json!({}))])
            .unwrap();
        assert_eq!(
            result,
            FlushResult::Failed {
                index: 1,
                failure: OperationFailure::DuplicateKey
            }
        );
    }

    #[test]
    fn test_list_filters_on_json_fields() {
        let (_dir, factory) = factory();
        let mut session = factory.open_session().unwrap();
        session.begin().unwrap();
        session
            .execute_operations(&[
                insert("job-b", json!({ "process_instance_id": "pi-1", "exclusive": true })),
                insert("job-a", json!({ "process_instance_id": "pi-1", "exclusive": false })),
                insert("job-c", json!({ "process_instance_id": "pi-2", "lock_owner": "w" })),
            ])
            .unwrap();

        let by_instance = session
            .select_list(&EntityQuery::new(EntityType::Job).filter("process_instance_id", "pi-1"))
            .unwrap();
        let ids: Vec<_> = by_instance.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["job-a", "job-b"]);

        let exclusive = session
            .select_list(&EntityQuery::new(EntityType::Job).filter("exclusive", true))
            .unwrap();
        assert_eq!(exclusive.len(), 1);

        let unlocked = session
            .select_list(&EntityQuery::new(EntityType::Job).filter("lock_owner", Value::Null))
            .unwrap();
        assert_eq!(unlocked.len(), 2);
    }

    #[test]
    fn test_list_rejects_unsafe_field_names() {
        let query = EntityQuery::new(EntityType::Job).filter("x') OR 1=1 --", "y");
        assert!(list_sql(&query).is_err());
    }
}
