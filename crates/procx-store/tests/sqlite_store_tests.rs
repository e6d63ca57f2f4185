#![allow(clippy::unwrap_used, clippy::expect_used)]

//! The command core running over SQLite sessions
use std::sync::{Arc, Barrier};
use std::thread;

use procx_core::authorization::{Grant, ANY};
use procx_core::commands::{
    CreateJobCmd, DeleteJobCmd, GetJobCmd, ListOperationLogCmd, SetJobRetriesCmd,
    StartProcessInstanceCmd,
};
use procx_core::model::Job;
use procx_core::{
    Authentication, CommandContext, CommandExecutor, ErrorKind, ExecutorConfig, FnCommand,
    Permission, ResourceType,
};
use procx_store::{SqliteGrants, SqliteSessionFactory};
use tempfile::TempDir;

fn open(dir: &TempDir) -> (SqliteSessionFactory, CommandExecutor) {
    let factory = SqliteSessionFactory::open(dir.path().join("procx.db")).unwrap();
    let executor = CommandExecutor::builder(Arc::new(factory.clone()))
        .build()
        .unwrap();
    (factory, executor)
}

#[test]
fn test_committed_state_survives_reopen() {
    // GIVEN a job created and updated through the executor
    let dir = TempDir::new().unwrap();
    {
        let (_, executor) = open(&dir);
        executor
            .execute(&CreateJobCmd::new("email").with_id("job-1"))
            .unwrap();
        executor
            .execute_as(
                &SetJobRetriesCmd::new("job-1", 7),
                Some(&Authentication::user("demo")),
            )
            .unwrap();
    }

    // WHEN the database is reopened
    let (_, executor) = open(&dir);
    let job = executor.execute(&GetJobCmd::new("job-1")).unwrap();

    // THEN the revision advanced once per write
    assert_eq!(job.rev, 2);
    assert_eq!(job.retries, 7);

    // AND the audit entry was committed with it
    let entries = executor.execute(&ListOperationLogCmd::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation_type, "SetJobRetries");
}

#[test]
fn test_competing_commit_forces_a_retry() {
    // GIVEN job-1 and a command whose first attempt is overtaken by another
    // connection right after loading
    let dir = TempDir::new().unwrap();
    let (factory, executor) = open(&dir);
    executor
        .execute(&CreateJobCmd::new("email").with_id("job-1"))
        .unwrap();

    let competitor = factory.clone();
    let cmd = FnCommand::new("OvertakenWrite", move |ctx: &mut CommandContext| {
        let mut job: Job = ctx.get("job-1")?;
        if ctx.correlation().attempt == 1 {
            let conn = competitor.connect().unwrap();
            conn.execute("UPDATE jobs SET rev = rev + 1 WHERE id = 'job-1'", [])
                .unwrap();
        }
        job.retries = 0;
        ctx.update(&job)
    });

    // WHEN it runs
    executor.execute(&cmd).unwrap();

    // THEN the second attempt applied on top of the competitor's revision
    let job = executor.execute(&GetJobCmd::new("job-1")).unwrap();
    assert_eq!(job.rev, 3);
    assert_eq!(job.retries, 0);
}

#[test]
fn test_concurrent_writers_converge() {
    // GIVEN two workers that both read job-1 before either writes
    let dir = TempDir::new().unwrap();
    let (_, executor) = open(&dir);
    executor
        .execute(&CreateJobCmd::new("email").with_id("job-1").with_retries(0))
        .unwrap();
    let barrier = Arc::new(Barrier::new(2));

    // WHEN each increments the retries
    thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let executor = executor.clone();
                let barrier = barrier.clone();
                s.spawn(move || {
                    let cmd = FnCommand::new("SqliteIncrement", move |ctx: &mut CommandContext| {
                        let mut job: Job = ctx.get("job-1")?;
                        if ctx.correlation().attempt == 1 {
                            barrier.wait();
                        }
                        job.retries += 1;
                        ctx.update(&job)
                    });
                    executor.execute(&cmd)
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    });

    // THEN neither increment was lost
    let job = executor.execute(&GetJobCmd::new("job-1")).unwrap();
    assert_eq!(job.retries, 2);
    assert_eq!(job.rev, 3);
}

#[test]
fn test_business_rule_failure_leaves_database_untouched() {
    let dir = TempDir::new().unwrap();
    let (factory, executor) = open(&dir);
    executor
        .execute(&CreateJobCmd::new("email").with_id("job-1"))
        .unwrap();
    let conn = factory.connect().unwrap();
    conn.execute(
        "UPDATE jobs SET state = json_set(state, '$.lock_owner', 'worker-1', \
         '$.lock_expiration', '2999-01-01T00:00:00Z') WHERE id = 'job-1'",
        [],
    )
    .unwrap();

    let err = executor
        .execute_as(&DeleteJobCmd::new("job-1"), Some(&Authentication::user("demo")))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    let rev: i64 = conn
        .query_row("SELECT rev FROM jobs WHERE id = 'job-1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rev, 1);
    let audits: i64 = conn
        .query_row("SELECT COUNT(*) FROM operation_log", [], |row| row.get(0))
        .unwrap();
    assert_eq!(audits, 0);
}

#[test]
fn test_stored_grants_gate_commands() {
    // GIVEN demo may create process instances but not jobs
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("procx.db");
    let factory = SqliteSessionFactory::open(&path).unwrap();
    let grants = SqliteGrants::open(&path).unwrap();
    grants
        .add_grant(&Grant::user(
            "demo",
            Permission::Create,
            ResourceType::ProcessInstance,
            ANY,
        ))
        .unwrap();
    let executor = CommandExecutor::builder(Arc::new(factory))
        .config(ExecutorConfig::default().with_authorization(true))
        .authorization_provider(Arc::new(grants))
        .build()
        .unwrap();
    let demo = Authentication::user("demo");

    // WHEN demo starts an instance and then creates a standalone job
    let started = executor.execute_as(&StartProcessInstanceCmd::new("invoice"), Some(&demo));
    let denied = executor.execute_as(&CreateJobCmd::new("email"), Some(&demo));

    // THEN only the permitted command ran
    assert!(started.is_ok());
    assert_eq!(denied.unwrap_err().kind(), ErrorKind::AuthorizationDenied);
}
