//! procx Engine - Orchestration layer
//!
//! Wires configuration, the SQLite store and the command executor into a
//! [`ProcessEngine`], and exposes:
//! - Services that run commands as the system or as an authenticated user
//! - A job executor that acquires due jobs and runs them on worker threads
//! - Engine configuration loading (TOML file plus `PROCX__*` environment)

pub mod config;
pub mod engine;
pub mod job_executor;
pub mod services;

pub use config::{DatabaseConfig, EngineConfig, JobExecutorConfig, LoggingConfig};
pub use engine::{ProcessEngine, ProcessEngineBuilder};
pub use job_executor::{JobExecutor, JobRunReport};
pub use services::{HistoryService, ManagementService, RuntimeService, TaskService};
