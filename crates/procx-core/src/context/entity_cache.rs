//! Per-attempt entity cache and unit of work
//!
//! Every entity read or written during an attempt lives here exactly once,
//! keyed by type and id, so all managers observe the same in-memory state.
//! Nothing reaches the session until [`EntityCache::flush_operations`] turns
//! the recorded changes into versioned operations.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{CommandError, Result};
use crate::persistence::{
    DbEntity, DbOperation, EntityQuery, EntityRow, EntityType, PersistenceSession,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Created in this attempt; not yet stored
    Transient,
    /// Loaded from the store
    Persistent,
    /// Loaded from the store and marked for deletion
    DeletedPersistent,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    state: Value,
    /// State as loaded; `None` for transient entries
    loaded: Option<Value>,
    rev: i64,
    status: EntryStatus,
    /// Order of first registration, used to order flush operations
    seq: u64,
}

impl CachedEntry {
    fn is_dirty(&self) -> bool {
        self.status == EntryStatus::Persistent && self.loaded.as_ref() != Some(&self.state)
    }

    fn is_deleted(&self) -> bool {
        self.status == EntryStatus::DeletedPersistent
    }

    fn to_entity<T: DbEntity>(&self) -> Result<T> {
        let mut entity: T = serde_json::from_value(self.state.clone())?;
        entity.set_revision(self.rev);
        Ok(entity)
    }
}

type Key = (EntityType, String);

#[derive(Debug, Default)]
pub struct EntityCache {
    entries: HashMap<Key, CachedEntry>,
    next_seq: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key<T: DbEntity>(id: &str) -> Key {
        (T::ENTITY_TYPE, id.to_string())
    }

    fn register(&mut self, key: Key, row_state: Value, rev: i64, status: EntryStatus) {
        let loaded = match status {
            EntryStatus::Transient => None,
            _ => Some(row_state.clone()),
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            CachedEntry {
                state: row_state,
                loaded,
                rev,
                status,
                seq,
            },
        );
    }

    /// Return the cached entity, loading it through the session on first access
    ///
    /// Entities deleted in this attempt are reported as absent.
    pub fn get_or_load<T: DbEntity>(
        &mut self,
        session: &mut dyn PersistenceSession,
        id: &str,
    ) -> Result<Option<T>> {
        let key = Self::key::<T>(id);
        if let Some(entry) = self.entries.get(&key) {
            if entry.is_deleted() {
                return Ok(None);
            }
            return entry.to_entity().map(Some);
        }

        match session.select_by_id(T::ENTITY_TYPE, id)? {
            Some(row) => {
                let entity = row.clone().into_entity::<T>()?;
                self.register(key, row.state, row.rev, EntryStatus::Persistent);
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    /// Run a query and merge the result with the cache
    ///
    /// Cached state wins over stored state and deleted entries are dropped.
    /// Cached entries the store did not return are included when their
    /// current state matches, whether inserted or changed in this attempt.
    /// Ordered by id.
    pub fn select_list<T: DbEntity>(
        &mut self,
        session: &mut dyn PersistenceSession,
        query: &EntityQuery,
    ) -> Result<Vec<T>> {
        if query.entity_type != T::ENTITY_TYPE {
            return Err(CommandError::internal(format!(
                "query for {} used to select {}",
                query.entity_type,
                T::ENTITY_TYPE
            )));
        }

        let rows: Vec<EntityRow> = session.select_list(query)?;
        let mut result: Vec<(String, T)> = Vec::with_capacity(rows.len());

        for row in rows {
            let key = (row.entity_type, row.id.clone());
            match self.entries.get(&key) {
                Some(entry) if entry.is_deleted() => {}
                Some(entry) => {
                    if query.matches(&entry.state) {
                        result.push((row.id, entry.to_entity()?));
                    }
                }
                None => {
                    let entity = row.clone().into_entity::<T>()?;
                    self.register(key, row.state, row.rev, EntryStatus::Persistent);
                    result.push((row.id, entity));
                }
            }
        }

        for ((entity_type, id), entry) in &self.entries {
            if *entity_type == T::ENTITY_TYPE
                && !entry.is_deleted()
                && query.matches(&entry.state)
                && !result.iter().any(|(existing, _)| existing == id)
            {
                result.push((id.clone(), entry.to_entity()?));
            }
        }

        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result.into_iter().map(|(_, entity)| entity).collect())
    }

    /// Register a new entity; stored at revision 1 on flush
    ///
    /// Re-inserting an id deleted earlier in the attempt revives the stored
    /// row instead: the entry flushes as one update at its load-time revision.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if an entity with the same id is already cached.
    pub fn insert<T: DbEntity>(&mut self, entity: &T) -> Result<()> {
        let key = Self::key::<T>(entity.id());
        let state = serde_json::to_value(entity)?;
        match self.entries.get_mut(&key) {
            Some(existing) if existing.is_deleted() => {
                existing.state = state;
                existing.status = EntryStatus::Persistent;
                Ok(())
            }
            Some(_) => Err(CommandError::internal(format!(
                "{} '{}' is already registered in this context",
                T::ENTITY_TYPE,
                entity.id()
            ))),
            None => {
                self.register(key, state, 1, EntryStatus::Transient);
                Ok(())
            }
        }
    }

    /// Replace the cached state of a loaded or inserted entity
    pub fn update<T: DbEntity>(&mut self, entity: &T) -> Result<()> {
        let key = Self::key::<T>(entity.id());
        let state = serde_json::to_value(entity)?;
        match self.entries.get_mut(&key) {
            Some(entry) if !entry.is_deleted() => {
                entry.state = state;
                Ok(())
            }
            _ => Err(CommandError::internal(format!(
                "{} '{}' must be loaded before it is updated",
                T::ENTITY_TYPE,
                entity.id()
            ))),
        }
    }

    /// Mark an entity for deletion at its load-time revision
    ///
    /// Deleting an entity inserted in the same attempt simply forgets it.
    pub fn delete<T: DbEntity>(&mut self, entity: &T) -> Result<()> {
        let key = Self::key::<T>(entity.id());
        match self.entries.get(&key).map(|e| e.status) {
            Some(EntryStatus::Transient) => {
                self.entries.remove(&key);
            }
            Some(EntryStatus::Persistent) => {
                if let Some(entry) = self.entries.get_mut(&key) {
                    entry.status = EntryStatus::DeletedPersistent;
                }
            }
            Some(EntryStatus::DeletedPersistent) => {}
            None => {
                let state = serde_json::to_value(entity)?;
                self.register(key, state, entity.revision(), EntryStatus::DeletedPersistent);
            }
        }
        Ok(())
    }

    pub fn status(&self, entity_type: EntityType, id: &str) -> Option<EntryStatus> {
        self.entries
            .get(&(entity_type, id.to_string()))
            .map(|e| e.status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Operations for every pending change: inserts, then updates, then deletes
    ///
    /// Updates carry the load-time revision as the expected revision and bump
    /// it by one. Unchanged entities produce nothing.
    pub fn flush_operations(&self) -> Vec<DbOperation> {
        let mut pending: Vec<(&Key, &CachedEntry)> = self.entries.iter().collect();
        pending.sort_by_key(|(_, entry)| entry.seq);

        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();

        for ((entity_type, id), entry) in pending {
            match entry.status {
                EntryStatus::Transient => inserts.push(DbOperation::Insert {
                    entity_type: *entity_type,
                    id: id.clone(),
                    rev: entry.rev,
                    state: entry.state.clone(),
                }),
                EntryStatus::Persistent if entry.is_dirty() => updates.push(DbOperation::Update {
                    entity_type: *entity_type,
                    id: id.clone(),
                    expected_rev: entry.rev,
                    new_rev: entry.rev + 1,
                    state: entry.state.clone(),
                }),
                EntryStatus::Persistent => {}
                EntryStatus::DeletedPersistent => deletes.push(DbOperation::Delete {
                    entity_type: *entity_type,
                    id: id.clone(),
                    expected_rev: entry.rev,
                }),
            }
        }

        inserts.extend(updates);
        inserts.extend(deletes);
        inserts
    }
}
