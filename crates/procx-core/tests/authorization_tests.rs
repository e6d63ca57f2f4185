#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Authorization gate: denied commands never flush and never audit
mod common;

use std::sync::Arc;

use serde_json::json;

use procx_core::authorization::{AllOf, DenyAll, Grant, InMemoryGrants, ANY};
use procx_core::commands::{
    CompleteTaskCmd, CreateTaskCmd, GetVariablesCmd, SetJobRetriesCmd, SetVariableCmd,
    StartProcessInstanceCmd,
};
use procx_core::{
    Authentication, AuthorizationProvider, CommandContext, CommandError, CommandExecutor,
    ErrorKind, ExecutorConfig, FnCommand, InMemoryStore, Permission, ResourceType,
};

use common::{audit_count, seed_job, stored_job, CountingFactory};

fn secured(counter: &CountingFactory, provider: Arc<dyn AuthorizationProvider>) -> CommandExecutor {
    CommandExecutor::builder(Arc::new(counter.clone()))
        .config(ExecutorConfig::default().with_authorization(true))
        .authorization_provider(provider)
        .build()
        .unwrap()
}

#[test]
fn test_denied_command_never_flushes() {
    // GIVEN demo may only read job-1
    let store = InMemoryStore::new();
    seed_job(&store, "job-1", 2, 3);
    let counter = CountingFactory::new(store.clone());
    let grants = InMemoryGrants::default().with(Grant::user(
        "demo",
        Permission::Read,
        ResourceType::Job,
        "job-1",
    ));
    let executor = secured(&counter, Arc::new(grants));

    // WHEN demo sets its retries
    let err = executor
        .execute_as(
            &SetJobRetriesCmd::new("job-1", 0),
            Some(&Authentication::user("demo")),
        )
        .unwrap_err();

    // THEN the denial names the missing permission
    match &err {
        CommandError::AuthorizationDenied {
            user_id,
            permission,
            resource_type,
            resource_id,
        } => {
            assert_eq!(user_id, "demo");
            assert_eq!(*permission, Permission::Update);
            assert_eq!(*resource_type, ResourceType::Job);
            assert_eq!(resource_id, "job-1");
        }
        other => panic!("unexpected error {other:?}"),
    }

    // AND nothing was flushed, retried or audited
    assert_eq!(counter.sessions(), 1);
    assert_eq!(counter.flushes(), 0);
    assert_eq!(stored_job(&store, "job-1").rev, 2);
    assert_eq!(audit_count(&store), 0);
}

#[test]
fn test_group_grant_on_any_resource_allows() {
    let store = InMemoryStore::new();
    seed_job(&store, "job-1", 1, 3);
    let counter = CountingFactory::new(store.clone());
    let grants = InMemoryGrants::default().with(Grant::group(
        "operators",
        Permission::All,
        ResourceType::Job,
        ANY,
    ));
    let executor = secured(&counter, Arc::new(grants));

    executor
        .execute_as(
            &SetJobRetriesCmd::new("job-1", 5),
            Some(&Authentication::new("demo", vec!["operators".to_string()])),
        )
        .unwrap();

    assert_eq!(stored_job(&store, "job-1").retries, 5);
    assert_eq!(audit_count(&store), 1);
}

#[test]
fn test_system_invocations_skip_checks() {
    let store = InMemoryStore::new();
    seed_job(&store, "job-1", 1, 3);
    let counter = CountingFactory::new(store.clone());
    let executor = secured(&counter, Arc::new(DenyAll));

    executor.execute(&SetJobRetriesCmd::new("job-1", 1)).unwrap();

    assert_eq!(stored_job(&store, "job-1").retries, 1);
}

#[test]
fn test_all_of_requires_every_provider() {
    let store = InMemoryStore::new();
    seed_job(&store, "job-1", 1, 3);
    let counter = CountingFactory::new(store.clone());
    let grants: Arc<dyn AuthorizationProvider> = Arc::new(InMemoryGrants::default().with(
        Grant::user("demo", Permission::Update, ResourceType::Job, ANY),
    ));
    let executor = secured(&counter, Arc::new(AllOf::new(vec![grants, Arc::new(DenyAll)])));

    let err = executor
        .execute_as(
            &SetJobRetriesCmd::new("job-1", 0),
            Some(&Authentication::user("demo")),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);
}

#[test]
fn test_nested_steps_bypass_checks_only_when_scoped() {
    // GIVEN an instance with a task, and demo holding only task grants
    let store = InMemoryStore::new();
    let counter = CountingFactory::new(store.clone());
    let demo = Authentication::user("demo");
    let grants = InMemoryGrants::default().with(Grant::user(
        "demo",
        Permission::Update,
        ResourceType::Task,
        ANY,
    ));
    let executor = secured(&counter, Arc::new(grants));
    let pi = executor
        .execute(&StartProcessInstanceCmd::new("invoice"))
        .unwrap();
    let task = executor
        .execute(&CreateTaskCmd::new("approve").for_process_instance(pi.id.as_str()))
        .unwrap();

    // WHEN a composite calls a nested command outside a bypass scope
    let pi_id = pi.id.clone();
    let unscoped = FnCommand::new("UnscopedNested", move |ctx: &mut CommandContext| {
        ctx.execute(&SetVariableCmd::new(pi_id.as_str(), "approved", json!(true)))
    });
    let err = executor.execute_as(&unscoped, Some(&demo)).unwrap_err();

    // THEN the nested command's own check denies it
    assert_eq!(err.kind(), ErrorKind::AuthorizationDenied);

    // WHEN completing the task hands a variable to the instance
    executor
        .execute_as(
            &CompleteTaskCmd::new(task.id.as_str()).with_variable("approved", json!(true)),
            Some(&demo),
        )
        .unwrap();

    // THEN the nested set ran under the task's authorization
    let vars = executor
        .execute(&GetVariablesCmd::new(pi.id.as_str()))
        .unwrap();
    assert_eq!(vars.get("approved"), Some(&json!(true)));
    // AND only the completion was audited
    assert_eq!(audit_count(&store), 1);
}
