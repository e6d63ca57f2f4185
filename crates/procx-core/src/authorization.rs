//! Authorization checks and providers
//!
//! A command declares the [`PermissionCheck`]s it needs; the authorization
//! stage evaluates them for the acting [`Authentication`] against an
//! [`AuthorizationProvider`] before the command body runs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{CommandError, Result};

/// Resource id that matches every resource of a type
pub const ANY: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    Update,
    Delete,
    Create,
    /// Grants every other permission
    All,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Update => "UPDATE",
            Permission::Delete => "DELETE",
            Permission::Create => "CREATE",
            Permission::All => "ALL",
        }
    }

    /// Whether holding `self` satisfies a request for `requested`
    pub fn covers(&self, requested: Permission) -> bool {
        *self == Permission::All || *self == requested
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "READ" => Ok(Permission::Read),
            "UPDATE" => Ok(Permission::Update),
            "DELETE" => Ok(Permission::Delete),
            "CREATE" => Ok(Permission::Create),
            "ALL" => Ok(Permission::All),
            other => Err(CommandError::validation(
                "permission",
                format!("unknown permission '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    ProcessInstance,
    Task,
    Job,
    OperationLog,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::ProcessInstance => "PROCESS_INSTANCE",
            ResourceType::Task => "TASK",
            ResourceType::Job => "JOB",
            ResourceType::OperationLog => "OPERATION_LOG",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "PROCESS_INSTANCE" => Ok(ResourceType::ProcessInstance),
            "TASK" => Ok(ResourceType::Task),
            "JOB" => Ok(ResourceType::Job),
            "OPERATION_LOG" => Ok(ResourceType::OperationLog),
            other => Err(CommandError::validation(
                "resource_type",
                format!("unknown resource type '{other}'"),
            )),
        }
    }
}

/// One permission a command needs on one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCheck {
    pub permission: Permission,
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl PermissionCheck {
    pub fn new(
        permission: Permission,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            permission,
            resource_type,
            resource_id: resource_id.into(),
        }
    }
}

/// The acting subject of an invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    pub user_id: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Authentication {
    pub fn new(user_id: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            groups,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Vec::new())
    }
}

/// Decides whether a subject holds a permission on a resource
pub trait AuthorizationProvider: Send + Sync {
    fn is_authorized(
        &self,
        user_id: &str,
        groups: &[String],
        permission: Permission,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool>;
}

/// Evaluate every check, failing on the first denial
pub fn check_all(
    provider: &dyn AuthorizationProvider,
    authentication: &Authentication,
    checks: &[PermissionCheck],
) -> Result<()> {
    for check in checks {
        let granted = provider.is_authorized(
            &authentication.user_id,
            &authentication.groups,
            check.permission,
            check.resource_type,
            &check.resource_id,
        )?;
        if !granted {
            return Err(CommandError::AuthorizationDenied {
                user_id: authentication.user_id.clone(),
                permission: check.permission,
                resource_type: check.resource_type,
                resource_id: check.resource_id.clone(),
            });
        }
    }
    Ok(())
}

/// Grants everything (authorization effectively off)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationProvider for AllowAll {
    fn is_authorized(
        &self,
        _: &str,
        _: &[String],
        _: Permission,
        _: ResourceType,
        _: &str,
    ) -> Result<bool> {
        Ok(true)
    }
}

/// Denies everything (for tests that verify denial stops all writes)
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AuthorizationProvider for DenyAll {
    fn is_authorized(
        &self,
        _: &str,
        _: &[String],
        _: Permission,
        _: ResourceType,
        _: &str,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Who a grant applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum GrantSubject {
    User(String),
    Group(String),
}

/// A stored permission grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub subject: GrantSubject,
    pub permission: Permission,
    pub resource_type: ResourceType,
    /// A concrete id or [`ANY`]
    pub resource_id: String,
}

impl Grant {
    pub fn user(
        user_id: impl Into<String>,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            subject: GrantSubject::User(user_id.into()),
            permission,
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    pub fn group(
        group_id: impl Into<String>,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            subject: GrantSubject::Group(group_id.into()),
            permission,
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    pub fn applies_to(&self, user_id: &str, groups: &[String]) -> bool {
        match &self.subject {
            GrantSubject::User(id) => id == user_id,
            GrantSubject::Group(id) => groups.iter().any(|g| g == id),
        }
    }

    pub fn allows(
        &self,
        permission: Permission,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> bool {
        self.resource_type == resource_type
            && self.permission.covers(permission)
            && (self.resource_id == ANY || self.resource_id == resource_id)
    }
}

/// Grants held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryGrants {
    grants: Vec<Grant>,
}

impl InMemoryGrants {
    pub fn new(grants: Vec<Grant>) -> Self {
        Self { grants }
    }

    pub fn with(mut self, grant: Grant) -> Self {
        self.grants.push(grant);
        self
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }
}

impl AuthorizationProvider for InMemoryGrants {
    fn is_authorized(
        &self,
        user_id: &str,
        groups: &[String],
        permission: Permission,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool> {
        Ok(self.grants.iter().any(|grant| {
            grant.applies_to(user_id, groups) && grant.allows(permission, resource_type, resource_id)
        }))
    }
}

/// AND-composition: authorized only if every provider agrees
///
/// An empty composition has nobody to agree and denies everything.
#[derive(Clone)]
pub struct AllOf {
    providers: Vec<Arc<dyn AuthorizationProvider>>,
}

impl AllOf {
    pub fn new(providers: Vec<Arc<dyn AuthorizationProvider>>) -> Self {
        Self { providers }
    }
}

impl AuthorizationProvider for AllOf {
    fn is_authorized(
        &self,
        user_id: &str,
        groups: &[String],
        permission: Permission,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<bool> {
        if self.providers.is_empty() {
            return Ok(false);
        }
        for provider in &self.providers {
            if !provider.is_authorized(user_id, groups, permission, resource_type, resource_id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_user_grant_on_specific_resource() {
        let grants = InMemoryGrants::default().with(Grant::user(
            "demo",
            Permission::Update,
            ResourceType::Job,
            "job-1",
        ));

        assert!(grants
            .is_authorized("demo", &[], Permission::Update, ResourceType::Job, "job-1")
            .unwrap());
        assert!(!grants
            .is_authorized("demo", &[], Permission::Update, ResourceType::Job, "job-2")
            .unwrap());
        assert!(!grants
            .is_authorized("demo", &[], Permission::Delete, ResourceType::Job, "job-1")
            .unwrap());
        assert!(!grants
            .is_authorized("other", &[], Permission::Update, ResourceType::Job, "job-1")
            .unwrap());
    }

    #[test]
    fn test_group_grant_with_wildcard() {
        let grants = InMemoryGrants::default().with(Grant::group(
            "ops",
            Permission::All,
            ResourceType::Task,
            ANY,
        ));

        assert!(grants
            .is_authorized("kim", &groups(&["ops"]), Permission::Delete, ResourceType::Task, "t-9")
            .unwrap());
        assert!(!grants
            .is_authorized("kim", &groups(&["sales"]), Permission::Read, ResourceType::Task, "t-9")
            .unwrap());
        assert!(!grants
            .is_authorized("kim", &groups(&["ops"]), Permission::Read, ResourceType::Job, "j-1")
            .unwrap());
    }

    #[test]
    fn test_check_all_reports_first_denial() {
        let grants = InMemoryGrants::default().with(Grant::user(
            "demo",
            Permission::Read,
            ResourceType::Task,
            ANY,
        ));
        let checks = vec![
            PermissionCheck::new(Permission::Read, ResourceType::Task, "t-1"),
            PermissionCheck::new(Permission::Update, ResourceType::Task, "t-1"),
        ];

        let err = check_all(&grants, &Authentication::user("demo"), &checks).unwrap_err();

        assert_eq!(
            err,
            CommandError::AuthorizationDenied {
                user_id: "demo".to_string(),
                permission: Permission::Update,
                resource_type: ResourceType::Task,
                resource_id: "t-1".to_string(),
            }
        );
    }

    #[test]
    fn test_all_of_requires_every_provider() {
        let allow: Arc<dyn AuthorizationProvider> = Arc::new(AllowAll);
        let deny: Arc<dyn AuthorizationProvider> = Arc::new(DenyAll);

        let both = AllOf::new(vec![allow.clone(), deny]);
        let only_allow = AllOf::new(vec![allow]);

        assert!(!both
            .is_authorized("u", &[], Permission::Read, ResourceType::Job, "j")
            .unwrap());
        assert!(only_allow
            .is_authorized("u", &[], Permission::Read, ResourceType::Job, "j")
            .unwrap());
    }

    #[test]
    fn test_empty_all_of_denies() {
        let nobody = AllOf::new(Vec::new());

        assert!(!nobody
            .is_authorized("u", &["admins".to_string()], Permission::Read, ResourceType::Job, ANY)
            .unwrap());
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("update".parse::<Permission>().unwrap(), Permission::Update);
        assert_eq!(
            "process-instance".parse::<ResourceType>().unwrap(),
            ResourceType::ProcessInstance
        );
        assert!("EXECUTE".parse::<Permission>().is_err());
    }

    proptest! {
        #[test]
        fn prop_all_permission_covers_everything(idx in 0usize..5) {
            let requested = [
                Permission::Read,
                Permission::Update,
                Permission::Delete,
                Permission::Create,
                Permission::All,
            ][idx];
            prop_assert!(Permission::All.covers(requested));
        }

        #[test]
        fn prop_wildcard_grant_matches_any_id(id in "[a-z0-9-]{1,16}") {
            let grant = Grant::user("u", Permission::Read, ResourceType::Job, ANY);
            prop_assert!(grant.allows(Permission::Read, ResourceType::Job, &id));
            prop_assert!(!grant.allows(Permission::Update, ResourceType::Job, &id));
        }
    }
}
