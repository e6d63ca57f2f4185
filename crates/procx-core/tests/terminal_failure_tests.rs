#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Terminal failures: abort at once, never retried, nothing flushed
mod common;

use chrono::{Duration, Utc};
use serde_json::json;

use procx_core::commands::{
    CompleteTaskCmd, CreateTaskCmd, DeleteJobCmd, GetVariablesCmd, PatchVariablesCmd,
    SetVariableCmd, StartProcessInstanceCmd,
};
use procx_core::{
    Authentication, CommandContext, CommandError, EntityType, ErrorKind, ExecutorConfig,
    FnCommand, InMemoryStore,
};

use common::{audit_count, seed_job, stored_job, CountingFactory};

#[test]
fn test_delete_locked_job_fails_without_retry() {
    // GIVEN job-1 locked by a worker until well into the future
    let store = InMemoryStore::new();
    let mut job = seed_job(&store, "job-1", 4, 3);
    job.lock("worker-1", Utc::now() + Duration::hours(1));
    store.seed_entity(&job).unwrap();
    let counter = CountingFactory::new(store.clone());
    let executor = common::executor(&counter, ExecutorConfig::default());

    // WHEN demo tries to delete it
    let err = executor
        .execute_as(&DeleteJobCmd::new("job-1"), Some(&Authentication::user("demo")))
        .unwrap_err();

    // THEN the business rule rejects it on the first and only attempt
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(err.entity_id(), Some("job-1"));
    assert!(err.to_string().contains("Cannot delete job"));
    assert_eq!(counter.sessions(), 1);
    assert_eq!(counter.flushes(), 0);

    // AND nothing changed
    assert_eq!(stored_job(&store, "job-1").rev, 4);
    assert_eq!(audit_count(&store), 0);
}

#[test]
fn test_delete_job_with_expired_lock_still_fails_without_retry() {
    // GIVEN job-1 whose lock by worker-1 ran out an hour ago
    let store = InMemoryStore::new();
    let mut job = seed_job(&store, "job-1", 4, 3);
    job.lock("worker-1", Utc::now() - Duration::hours(1));
    store.seed_entity(&job).unwrap();
    let counter = CountingFactory::new(store.clone());
    let executor = common::executor(&counter, ExecutorConfig::default());

    // WHEN demo tries to delete it
    let err = executor
        .execute_as(&DeleteJobCmd::new("job-1"), Some(&Authentication::user("demo")))
        .unwrap_err();

    // THEN the lock owner alone blocks the delete
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(counter.sessions(), 1);
    assert_eq!(counter.flushes(), 0);
    assert_eq!(stored_job(&store, "job-1").rev, 4);
    assert_eq!(audit_count(&store), 0);
}

#[test]
fn test_complete_missing_task_is_not_found_before_flush() {
    // GIVEN an empty store
    let store = InMemoryStore::new();
    let counter = CountingFactory::new(store.clone());
    let executor = common::executor(&counter, ExecutorConfig::default());

    // WHEN completing a task that does not exist
    let err = executor
        .execute(&CompleteTaskCmd::new("missing-task"))
        .unwrap_err();

    // THEN NotFound names the task and nothing was flushed
    assert_eq!(
        err,
        CommandError::not_found(EntityType::Task, "missing-task")
    );
    assert_eq!(counter.sessions(), 1);
    assert_eq!(counter.flushes(), 0);
}

#[test]
fn test_validation_precedes_loading() {
    let store = InMemoryStore::new();
    let counter = CountingFactory::new(store.clone());
    let executor = common::executor(&counter, ExecutorConfig::default());

    let err = executor
        .execute(&SetVariableCmd::new("pi-1", "", json!(1)))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(counter.flushes(), 0);
}

#[test]
fn test_nested_failure_rolls_back_the_whole_patch() {
    // GIVEN a running instance with one variable
    let store = InMemoryStore::new();
    let counter = CountingFactory::new(store.clone());
    let executor = common::executor(&counter, ExecutorConfig::default());
    let pi = executor
        .execute(&StartProcessInstanceCmd::new("invoice").with_variable("amount", json!(100)))
        .unwrap();
    let commits_before = counter.commits();

    // WHEN a patch sets one variable and then removes one with an empty name
    let err = executor
        .execute_as(
            &PatchVariablesCmd::new(pi.id.as_str())
                .set("approved", json!(true))
                .remove(""),
            Some(&Authentication::user("demo")),
        )
        .unwrap_err();

    // THEN the nested validation error aborts the composite
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(counter.commits(), commits_before);

    // AND the earlier set did not survive
    let vars = executor
        .execute(&GetVariablesCmd::new(pi.id.as_str()))
        .unwrap();
    assert_eq!(vars.len(), 1);
    assert_eq!(vars.get("amount"), Some(&json!(100)));
    assert_eq!(audit_count(&store), 0);
}

#[test]
fn test_nested_commands_share_the_parent_transaction() {
    // GIVEN a composite that creates a task through a nested command and
    // then fails
    let store = InMemoryStore::new();
    let counter = CountingFactory::new(store.clone());
    let executor = common::executor(&counter, ExecutorConfig::default());
    let cmd = FnCommand::new("CreateThenFail", |ctx: &mut CommandContext| {
        let task = ctx.execute(&CreateTaskCmd::new("review"))?;
        // read-your-writes through the shared cache
        let again = ctx.tasks().get(&task.id)?;
        assert_eq!(again.name, "review");
        Err::<(), _>(CommandError::business_rule(
            EntityType::Task,
            task.id.as_str(),
            "rejected after creation",
        ))
    });

    // WHEN it runs
    let err = executor.execute(&cmd).unwrap_err();

    // THEN one session was used and the nested insert was rolled back
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    assert_eq!(counter.sessions(), 1);
    assert_eq!(store.count(EntityType::Task).unwrap(), 0);
}
