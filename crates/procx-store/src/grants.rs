//! Grants persisted in the `authorizations` table

use std::path::Path;
use std::sync::Mutex;

use procx_core::authorization::{AuthorizationProvider, Grant, GrantSubject};
use procx_core::errors::CommandError;
use procx_core::{Permission, ResourceType};
use rusqlite::{params, Connection};

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;

/// Authorization provider reading grants from SQLite
pub struct SqliteGrants {
    conn: Mutex<Connection>,
}

impl SqliteGrants {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = db::open(path)?;
        apply_migrations(&mut conn)?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CommandError::internal("grant connection poisoned"))
    }

    /// Store a grant; adding an existing grant again is a no-op
    pub fn add_grant(&self, grant: &Grant) -> Result<()> {
        let (kind, subject_id) = subject_columns(&grant.subject);
        self.conn()?
            .execute(
                "INSERT OR IGNORE INTO authorizations
                    (subject_kind, subject_id, permission, resource_type, resource_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    kind,
                    subject_id,
                    grant.permission.as_str(),
                    grant.resource_type.as_str(),
                    grant.resource_id
                ],
            )
            .map_err(from_rusqlite)?;
        Ok(())
    }

    pub fn list_grants(&self) -> Result<Vec<Grant>> {
        self.query_grants(
            "SELECT subject_kind, subject_id, permission, resource_type, resource_id
             FROM authorizations ORDER BY id",
            &[],
        )
    }

    fn grants_for(&self, resource_type: ResourceType) -> Result<Vec<Grant>> {
        self.query_grants(
            "SELECT subject_kind, subject_id, permission, resource_type, resource_id
             FROM authorizations WHERE resource_type = ?1",
            &[resource_type.as_str()],
        )
    }

    fn query_grants(&self, sql: &str, args: &[&str]) -> Result<Vec<Grant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter()
            .map(|(kind, subject_id, permission, resource_type, resource_id)| {
                let subject = match kind.as_str() {
                    "user" => GrantSubject::User(subject_id),
                    "group" => GrantSubject::Group(subject_id),
                    other => {
                        return Err(CommandError::persistence(
                            "grants",
                            format!("unknown subject kind '{other}'"),
                        ))
                    }
                };
                Ok(Grant {
                    subject,
                    permission: permission.parse::<Permission>()?,
                    resource_type: resource_type.parse::<ResourceType>()?,
                    resource_id,
                })
            })
            .collect()
    }
}

fn subject_columns(subject: &GrantSubject) -> (&'static str, &str) {
    match subject {
        GrantSubject::User(id) => ("user", id),
        GrantSubject::Group(id) => ("group", id),
    }
}

impl AuthorizationProvider for SqliteGrants {
    fn is_authorized(
        &self,
        user_id: &str,
        groups: &[String],
        permission: Permission,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool> {
        Ok(self.grants_for(resource_type)?.iter().any(|grant| {
            grant.applies_to(user_id, groups) && grant.allows(permission, resource_type, resource_id)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procx_core::authorization::ANY;

    fn grants() -> SqliteGrants {
        let mut conn = db::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        SqliteGrants::new(conn)
    }

    #[test]
    fn test_user_grant_round_trip() {
        let store = grants();
        let grant = Grant::user("demo", Permission::Update, ResourceType::Job, "job-1");
        store.add_grant(&grant).unwrap();
        store.add_grant(&grant).unwrap();

        assert_eq!(store.list_grants().unwrap(), vec![grant]);
        assert!(store
            .is_authorized("demo", &[], Permission::Update, ResourceType::Job, "job-1")
            .unwrap());
        assert!(!store
            .is_authorized("demo", &[], Permission::Update, ResourceType::Job, "job-2")
            .unwrap());
        assert!(!store
            .is_authorized("other", &[], Permission::Update, ResourceType::Job, "job-1")
            .unwrap());
    }

    #[test]
    fn test_group_wildcard_grant() {
        let store = grants();
        store
            .add_grant(&Grant::group("ops", Permission::All, ResourceType::Task, ANY))
            .unwrap();

        let groups = vec!["ops".to_string()];
        assert!(store
            .is_authorized("anyone", &groups, Permission::Delete, ResourceType::Task, "t-9")
            .unwrap());
        assert!(!store
            .is_authorized("anyone", &groups, Permission::Delete, ResourceType::Job, "t-9")
            .unwrap());
    }
}
