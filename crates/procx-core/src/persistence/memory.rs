//! Thread-safe in-memory store
//!
//! Sessions stage operations at flush, checking them against committed rows
//! plus the session's own staged writes. Commit re-checks every staged
//! operation under the store lock and applies all of them or none, so the
//! first writer to commit wins and later writers see a revision mismatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use super::{
    lock_error, DbEntity, DbOperation, EntityQuery, EntityRow, EntityType, FlushResult,
    OperationFailure, PersistenceSession, SessionFactory,
};
use crate::errors::{CommandError, Result};

#[derive(Debug, Clone, PartialEq)]
struct StoredRow {
    rev: i64,
    state: Value,
}

type Key = (EntityType, String);
type Tables = BTreeMap<EntityType, BTreeMap<String, StoredRow>>;

fn lock(tables: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>> {
    tables
        .lock()
        .map_err(|_| CommandError::persistence("memory_store", "store mutex poisoned"))
}

/// Result of applying `op` to the row currently visible under its key
fn apply(
    op: &DbOperation,
    current: Option<&StoredRow>,
) -> std::result::Result<Option<StoredRow>, OperationFailure> {
    match (op, current) {
        (DbOperation::Insert { .. }, Some(_)) => Err(OperationFailure::DuplicateKey),
        (DbOperation::Insert { rev, state, .. }, None) => Ok(Some(StoredRow {
            rev: *rev,
            state: state.clone(),
        })),
        (
            DbOperation::Update {
                expected_rev,
                new_rev,
                state,
                ..
            },
            Some(row),
        ) if row.rev == *expected_rev => Ok(Some(StoredRow {
            rev: *new_rev,
            state: state.clone(),
        })),
        (DbOperation::Delete { expected_rev, .. }, Some(row)) if row.rev == *expected_rev => {
            Ok(None)
        }
        _ => Err(OperationFailure::RevisionMismatch),
    }
}

fn key_of(op: &DbOperation) -> Key {
    (op.entity_type(), op.id().to_string())
}

/// Shared in-memory store; clones share the same tables
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a row directly, bypassing revision checks
    pub fn seed(&self, row: EntityRow) -> Result<()> {
        let mut tables = lock(&self.tables)?;
        tables.entry(row.entity_type).or_default().insert(
            row.id,
            StoredRow {
                rev: row.rev,
                state: row.state,
            },
        );
        Ok(())
    }

    /// Seed a typed entity at its current revision
    pub fn seed_entity<T: DbEntity>(&self, entity: &T) -> Result<()> {
        self.seed(EntityRow::from_entity(entity)?)
    }

    pub fn get(&self, entity_type: EntityType, id: &str) -> Result<Option<EntityRow>> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .get(&entity_type)
            .and_then(|t| t.get(id))
            .map(|row| EntityRow {
                entity_type,
                id: id.to_string(),
                rev: row.rev,
                state: row.state.clone(),
            }))
    }

    pub fn get_entity<T: DbEntity>(&self, id: &str) -> Result<Option<T>> {
        self.get(T::ENTITY_TYPE, id)?
            .map(EntityRow::into_entity)
            .transpose()
    }

    /// All committed rows of one type, ordered by id
    pub fn rows(&self, entity_type: EntityType) -> Result<Vec<EntityRow>> {
        let tables = lock(&self.tables)?;
        Ok(tables
            .get(&entity_type)
            .map(|t| {
                t.iter()
                    .map(|(id, row)| EntityRow {
                        entity_type,
                        id: id.clone(),
                        rev: row.rev,
                        state: row.state.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn count(&self, entity_type: EntityType) -> Result<usize> {
        let tables = lock(&self.tables)?;
        Ok(tables.get(&entity_type).map(BTreeMap::len).unwrap_or(0))
    }
}

impl SessionFactory for InMemoryStore {
    fn open_session(&self) -> Result<Box<dyn PersistenceSession>> {
        Ok(Box::new(InMemorySession {
            tables: self.tables.clone(),
            staged: Vec::new(),
            overlay: HashMap::new(),
        }))
    }
}

/// Transaction over an [`InMemoryStore`]
pub struct InMemorySession {
    tables: Arc<Mutex<Tables>>,
    staged: Vec<DbOperation>,
    /// Rows written by staged operations; `None` marks a staged delete
    overlay: HashMap<Key, Option<StoredRow>>,
}

impl InMemorySession {
    fn visible<'a>(&'a self, tables: &'a Tables, key: &Key) -> Option<&'a StoredRow> {
        match self.overlay.get(key) {
            Some(staged) => staged.as_ref(),
            None => tables.get(&key.0).and_then(|t| t.get(&key.1)),
        }
    }

    fn discard(&mut self) {
        self.staged.clear();
        self.overlay.clear();
    }
}

impl PersistenceSession for InMemorySession {
    fn begin(&mut self) -> Result<()> {
        self.discard();
        Ok(())
    }

    fn select_by_id(&mut self, entity_type: EntityType, id: &str) -> Result<Option<EntityRow>> {
        let tables = lock(&self.tables)?;
        let key = (entity_type, id.to_string());
        Ok(self.visible(&tables, &key).map(|row| EntityRow {
            entity_type,
            id: id.to_string(),
            rev: row.rev,
            state: row.state.clone(),
        }))
    }

    fn select_list(&mut self, query: &EntityQuery) -> Result<Vec<EntityRow>> {
        let tables = lock(&self.tables)?;
        let mut merged: BTreeMap<String, StoredRow> = tables
            .get(&query.entity_type)
            .cloned()
            .unwrap_or_default();
        for ((entity_type, id), staged) in &self.overlay {
            if *entity_type != query.entity_type {
                continue;
            }
            match staged {
                Some(row) => {
                    merged.insert(id.clone(), row.clone());
                }
                None => {
                    merged.remove(id);
                }
            }
        }

        Ok(merged
            .into_iter()
            .filter(|(_, row)| query.matches(&row.state))
            .map(|(id, row)| EntityRow {
                entity_type: query.entity_type,
                id,
                rev: row.rev,
                state: row.state,
            })
            .collect())
    }

    fn execute_operations(&mut self, ops: &[DbOperation]) -> Result<FlushResult> {
        let shared = self.tables.clone();
        let tables = lock(&shared)?;
        for (index, op) in ops.iter().enumerate() {
            let key = key_of(op);
            match apply(op, self.visible(&tables, &key)) {
                Ok(next) => {
                    self.overlay.insert(key, next);
                    self.staged.push(op.clone());
                }
                Err(failure) => return Ok(FlushResult::Failed { index, failure }),
            }
        }
        Ok(FlushResult::Applied)
    }

    fn commit(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        self.overlay.clear();
        if staged.is_empty() {
            return Ok(());
        }

        let mut tables = lock(&self.tables)?;
        let mut scratch: HashMap<Key, Option<StoredRow>> = HashMap::new();
        for op in &staged {
            let key = key_of(op);
            let current = match scratch.get(&key) {
                Some(row) => row.as_ref(),
                None => tables.get(&key.0).and_then(|t| t.get(&key.1)),
            };
            let next = apply(op, current).map_err(|_| lock_error(op))?;
            scratch.insert(key, next);
        }

        for ((entity_type, id), row) in scratch {
            let table = tables.entry(entity_type).or_default();
            match row {
                Some(row) => {
                    table.insert(id, row);
                }
                None => {
                    table.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.discard();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_row(id: &str, rev: i64, retries: i64) -> EntityRow {
        EntityRow {
            entity_type: EntityType::Job,
            id: id.to_string(),
            rev,
            state: json!({ "id": id, "retries": retries }),
        }
    }

    fn update(id: &str, expected_rev: i64, retries: i64) -> DbOperation {
        DbOperation::Update {
            entity_type: EntityType::Job,
            id: id.to_string(),
            expected_rev,
            new_rev: expected_rev + 1,
            state: json!({ "id": id, "retries": retries }),
        }
    }

    #[test]
    fn test_update_applies_at_commit_only() {
        // GIVEN a job at revision 5
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 5, 3)).unwrap();
        let mut session = store.open_session().unwrap();
        session.begin().unwrap();

        // WHEN an update is flushed but not committed
        let result = session.execute_operations(&[update("job-1", 5, 0)]).unwrap();

        // THEN the session sees its write, the store does not
        assert_eq!(result, FlushResult::Applied);
        assert_eq!(session.select_by_id(EntityType::Job, "job-1").unwrap().unwrap().rev, 6);
        assert_eq!(store.get(EntityType::Job, "job-1").unwrap().unwrap().rev, 5);

        session.commit().unwrap();
        let row = store.get(EntityType::Job, "job-1").unwrap().unwrap();
        assert_eq!(row.rev, 6);
        assert_eq!(row.state["retries"], 0);
    }

    #[test]
    fn test_stale_revision_fails_at_flush() {
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 6, 3)).unwrap();
        let mut session = store.open_session().unwrap();

        let result = session
            .execute_operations(&[
                DbOperation::Insert {
                    entity_type: EntityType::Task,
                    id: "t-1".to_string(),
                    rev: 1,
                    state: json!({}),
                },
                update("job-1", 5, 0),
            ])
            .unwrap();

        assert_eq!(
            result,
            FlushResult::Failed {
                index: 1,
                failure: OperationFailure::RevisionMismatch
            }
        );
    }

    #[test]
    fn test_second_committer_loses() {
        // GIVEN two sessions that both flushed an update from revision 5
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 5, 3)).unwrap();
        let mut first = store.open_session().unwrap();
        let mut second = store.open_session().unwrap();
        first.execute_operations(&[update("job-1", 5, 1)]).unwrap();
        second.execute_operations(&[update("job-1", 5, 2)]).unwrap();

        // WHEN both commit
        first.commit().unwrap();
        let err = second.commit().unwrap_err();

        // THEN the later commit is an optimistic-lock conflict and changes nothing
        assert!(err.is_retryable());
        let row = store.get(EntityType::Job, "job-1").unwrap().unwrap();
        assert_eq!(row.rev, 6);
        assert_eq!(row.state["retries"], 1);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 1, 3)).unwrap();
        store.seed(job_row("job-2", 1, 3)).unwrap();

        let mut loser = store.open_session().unwrap();
        loser
            .execute_operations(&[update("job-1", 1, 0), update("job-2", 1, 0)])
            .unwrap();

        let mut winner = store.open_session().unwrap();
        winner.execute_operations(&[update("job-2", 1, 9)]).unwrap();
        winner.commit().unwrap();

        assert!(loser.commit().is_err());
        assert_eq!(store.get(EntityType::Job, "job-1").unwrap().unwrap().rev, 1);
    }

    #[test]
    fn test_duplicate_insert_is_reported() {
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 1, 3)).unwrap();
        let mut session = store.open_session().unwrap();

        let result = session
            .execute_operations(&[DbOperation::Insert {
                entity_type: EntityType::Job,
                id: "job-1".to_string(),
                rev: 1,
                state: json!({}),
            }])
            .unwrap();

        assert_eq!(
            result,
            FlushResult::Failed {
                index: 0,
                failure: OperationFailure::DuplicateKey
            }
        );
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 1, 3)).unwrap();
        let mut session = store.open_session().unwrap();
        session
            .execute_operations(&[DbOperation::Delete {
                entity_type: EntityType::Job,
                id: "job-1".to_string(),
                expected_rev: 1,
            }])
            .unwrap();
        assert!(session.select_by_id(EntityType::Job, "job-1").unwrap().is_none());

        session.rollback().unwrap();
        session.commit().unwrap();

        assert_eq!(store.count(EntityType::Job).unwrap(), 1);
    }

    #[test]
    fn test_select_list_merges_staged_rows() {
        let store = InMemoryStore::new();
        store.seed(job_row("job-1", 1, 3)).unwrap();
        store.seed(job_row("job-2", 1, 3)).unwrap();
        let mut session = store.open_session().unwrap();
        session.execute_operations(&[update("job-2", 1, 0)]).unwrap();

        let rows = session
            .select_list(&EntityQuery::new(EntityType::Job).filter("retries", 3))
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["job-1"]);
    }
}
