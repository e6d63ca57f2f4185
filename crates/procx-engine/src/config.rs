//! Engine configuration
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. `PROCX__<SECTION>__<KEY>` environment variables, e.g.
//!    `PROCX__EXECUTOR__RETRY_BUDGET=5`

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use procx_core::errors::{CommandError, Result};
use procx_core::logging_facility::Profile;
use procx_core::ExecutorConfig;
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "PROCX";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// How long a writer waits on a locked database
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("procx.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobExecutorConfig {
    /// Owner written into acquired jobs; generated per engine when unset
    pub lock_owner: Option<String>,
    pub lock_duration_secs: i64,
    pub max_jobs_per_acquisition: usize,
    pub workers: usize,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            lock_owner: None,
            lock_duration_secs: 300,
            max_jobs_per_acquisition: 3,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub profile: Profile,
}

/// Everything needed to open a [`crate::ProcessEngine`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub executor: ExecutorConfig,
    pub job_executor: JobExecutorConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load from an optional TOML file plus environment overrides, then
    /// validate
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or parsed, a value
    /// has the wrong type, or the result fails [`EngineConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        Self::from_builder(builder)
    }

    /// Load from TOML text plus environment overrides
    ///
    /// # Errors
    ///
    /// Same as [`EngineConfig::load`].
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let loaded: EngineConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize::<EngineConfig>())
            .map_err(|e| CommandError::configuration(e.to_string()))?;

        loaded.validate()?;
        tracing::debug!(
            component = module_path!(),
            database = %loaded.database.path.display(),
            retry_budget = loaded.executor.retry_budget,
            workers = loaded.job_executor.workers,
            "engine configuration loaded"
        );
        Ok(loaded)
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = path.into();
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// # Errors
    ///
    /// Returns `Configuration` for an invalid interceptor order, an empty
    /// database path or job executor limits that would never run a job.
    pub fn validate(&self) -> Result<()> {
        self.executor.validate()?;

        if self.database.path.as_os_str().is_empty() {
            return Err(CommandError::configuration("database.path must not be empty"));
        }
        if self.job_executor.workers == 0 {
            return Err(CommandError::configuration(
                "job_executor.workers must be at least 1",
            ));
        }
        if self.job_executor.max_jobs_per_acquisition == 0 {
            return Err(CommandError::configuration(
                "job_executor.max_jobs_per_acquisition must be at least 1",
            ));
        }
        if self.job_executor.lock_duration_secs <= 0 {
            return Err(CommandError::configuration(
                "job_executor.lock_duration_secs must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procx_core::{AuditVerbosity, ErrorKind, InterceptorKind};

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.executor.retry_budget, 3);
        assert_eq!(config.logging.profile, Profile::Development);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/procx/engine.db"

            [executor]
            retry_budget = 5
            audit = "full"

            [executor.retry_backoff]
            base_ms = 10
            max_ms = 200

            [logging]
            profile = "production"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/var/lib/procx/engine.db"));
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.executor.retry_budget, 5);
        assert_eq!(config.executor.audit, AuditVerbosity::Full);
        assert_eq!(config.executor.retry_backoff.max_ms, 200);
        assert_eq!(config.executor.interceptors, ExecutorConfig::default_interceptors());
        assert_eq!(config.job_executor, JobExecutorConfig::default());
        assert_eq!(config.logging.profile, Profile::Production);
    }

    #[test]
    fn test_custom_interceptor_order_is_validated() {
        let ok = EngineConfig::from_toml_str(
            r#"
            [executor]
            interceptors = ["retry", "transaction", "context"]
            "#,
        )
        .unwrap();
        assert_eq!(
            ok.executor.interceptors,
            vec![
                InterceptorKind::Retry,
                InterceptorKind::Transaction,
                InterceptorKind::Context
            ]
        );

        let err = EngineConfig::from_toml_str(
            r#"
            [executor]
            interceptors = ["transaction", "retry", "context"]
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [job_executor]
            workers = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_wrong_value_type_is_configuration_error() {
        let err = EngineConfig::from_toml_str(
            r#"
            [executor]
            retry_budget = "many"
            "#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
