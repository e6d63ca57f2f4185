#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Environment overrides; kept in their own binary so no other test sees
//! the variables
use std::io::Write;

use procx_engine::EngineConfig;
use tempfile::NamedTempFile;

#[test]
fn test_environment_overrides_file_values() {
    // GIVEN a config file with a retry budget
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[executor]\nretry_budget = 2\n\n[job_executor]\nworkers = 3").unwrap();

    // AND an environment override for the same key
    std::env::set_var("PROCX__EXECUTOR__RETRY_BUDGET", "7");

    // WHEN the configuration is loaded
    let config = EngineConfig::load(Some(file.path())).unwrap();
    std::env::remove_var("PROCX__EXECUTOR__RETRY_BUDGET");

    // THEN the environment wins and untouched keys come from the file
    assert_eq!(config.executor.retry_budget, 7);
    assert_eq!(config.job_executor.workers, 3);
}

#[test]
fn test_missing_file_is_configuration_error() {
    let err = EngineConfig::load(Some(std::path::Path::new("/nonexistent/procx.toml"))).unwrap_err();
    assert_eq!(err.kind(), procx_core::ErrorKind::Configuration);
}
