#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI integration tests: drive the built binary against a scratch database
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn procx(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_procx"))
        .arg("--db")
        .arg(db)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "procx failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_cli_init_creates_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("procx.db");

    let out = stdout_of(&procx(&db, &["init"]));

    assert!(out.starts_with("Initialized"));
    assert!(db.exists());
}

#[test]
fn test_cli_task_flow_hands_variables_to_instance() {
    // GIVEN an instance with a task
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("procx.db");
    let pi = stdout_of(&procx(&db, &["process", "start", "invoice", "--var", "amount=250"]));
    let task = stdout_of(&procx(
        &db,
        &["task", "create", "approve", "--process-instance", &pi],
    ));

    // WHEN demo claims and completes it
    stdout_of(&procx(&db, &["--user", "demo", "task", "claim", &task]));
    stdout_of(&procx(
        &db,
        &["--user", "demo", "task", "complete", &task, "--var", "approved=true"],
    ));

    // THEN both variables are on the instance
    let vars: Value =
        serde_json::from_str(&stdout_of(&procx(&db, &["variable", "list", &pi]))).unwrap();
    assert_eq!(vars["amount"], 250);
    assert_eq!(vars["approved"], true);

    // AND the operation log holds demo's claim and completion
    let log: Value = serde_json::from_str(&stdout_of(&procx(
        &db,
        &["oplog", "list", "--process-instance", &pi],
    )))
    .unwrap();
    let types: Vec<_> = log
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["operation_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["Claim", "Complete"]);
}

#[test]
fn test_cli_negative_retries_fail_with_validation_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("procx.db");
    stdout_of(&procx(&db, &["job", "create", "log", "--id", "job-1"]));

    let output = procx(&db, &["job", "set-retries", "job-1", "-1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid retries"), "stderr: {stderr}");
}

#[test]
fn test_cli_job_run_executes_log_jobs_and_records_failures() {
    // GIVEN a log job and a job nobody handles
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("procx.db");
    stdout_of(&procx(&db, &["job", "create", "log", "--payload", "{\"msg\":\"hi\"}"]));
    stdout_of(&procx(
        &db,
        &["job", "create", "mystery", "--id", "job-m", "--retries", "1"],
    ));

    // WHEN the executor runs
    let out = stdout_of(&procx(&db, &["job", "run"]));

    // THEN the log job completed and the other failed once
    assert_eq!(out, "acquired=2 completed=1 failed=1 skipped=0");
    let jobs: Value = serde_json::from_str(&stdout_of(&procx(&db, &["job", "list"]))).unwrap();
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], "job-m");
    assert_eq!(jobs[0]["retries"], 0);
}

#[test]
fn test_cli_grants_gate_commands_when_enabled() {
    // GIVEN a config with authorization on
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("procx.db");
    let config = dir.path().join("procx.toml");
    std::fs::write(&config, "[executor]\nauthorization_enabled = true\n").unwrap();
    let config = config.to_str().unwrap();
    stdout_of(&procx(&db, &["job", "create", "log", "--id", "job-1"]));

    // WHEN demo has no grant
    let denied = procx(
        &db,
        &["--config", config, "--user", "demo", "job", "set-retries", "job-1", "5"],
    );

    // THEN the command is denied
    assert!(!denied.status.success());
    assert!(String::from_utf8_lossy(&denied.stderr).contains("lacks UPDATE permission"));

    // WHEN the grant is added
    stdout_of(&procx(
        &db,
        &["grant", "add", "--to-user", "demo", "UPDATE", "JOB", "job-1"],
    ));

    // THEN the same command succeeds
    stdout_of(&procx(
        &db,
        &["--config", config, "--user", "demo", "job", "set-retries", "job-1", "5"],
    ));
}
