//! Subcommand implementations and the engine context they share

pub mod grant;
pub mod job;
pub mod oplog;
pub mod process;
pub mod task;
pub mod variable;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use procx_core::commands::JobHandler;
use procx_core::logging_facility;
use procx_core::model::Job;
use procx_core::{Authentication, CommandContext};
use procx_engine::{
    EngineConfig, HistoryService, ManagementService, ProcessEngine, RuntimeService, TaskService,
};
use serde_json::Value;

/// Engine plus the acting user for one CLI invocation
pub struct Context {
    pub engine: ProcessEngine,
    pub authentication: Option<Authentication>,
}

impl Context {
    pub fn open(
        db: Option<&Path>,
        config: Option<&Path>,
        user: Option<String>,
        groups: Vec<String>,
    ) -> anyhow::Result<Self> {
        let mut engine_config = EngineConfig::load(config).context("loading configuration")?;
        if let Some(db) = db {
            engine_config.database.path = db.to_path_buf();
        }
        logging_facility::init(engine_config.logging.profile);

        let path = engine_config.database.path.clone();
        let engine = ProcessEngine::builder(engine_config)
            .job_handler(Arc::new(LogJobHandler))
            .open()
            .with_context(|| format!("opening database {}", path.display()))?;

        Ok(Self {
            engine,
            authentication: user.map(|user| Authentication::new(user, groups)),
        })
    }

    pub fn runtime(&self) -> RuntimeService<'_> {
        let service = self.engine.runtime_service();
        match &self.authentication {
            Some(auth) => service.as_user(auth.clone()),
            None => service,
        }
    }

    pub fn tasks(&self) -> TaskService<'_> {
        let service = self.engine.task_service();
        match &self.authentication {
            Some(auth) => service.as_user(auth.clone()),
            None => service,
        }
    }

    pub fn management(&self) -> ManagementService<'_> {
        let service = self.engine.management_service();
        match &self.authentication {
            Some(auth) => service.as_user(auth.clone()),
            None => service,
        }
    }

    pub fn history(&self) -> HistoryService<'_> {
        let service = self.engine.history_service();
        match &self.authentication {
            Some(auth) => service.as_user(auth.clone()),
            None => service,
        }
    }
}

/// Execute init command
pub fn init(ctx: &Context) -> anyhow::Result<()> {
    println!(
        "Initialized {}",
        ctx.engine.config().database.path.display()
    );
    Ok(())
}

/// Parse `name=value`; the value is JSON when it parses as JSON, else a string
pub fn parse_variable(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    if name.is_empty() {
        return Err("variable name must not be empty".to_string());
    }
    Ok((name.to_string(), parse_value(value)))
}

pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub fn variables(pairs: Vec<(String, Value)>) -> BTreeMap<String, Value> {
    pairs.into_iter().collect()
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Built-in handler for `log` jobs: records the payload and completes
struct LogJobHandler;

impl JobHandler for LogJobHandler {
    fn job_type(&self) -> &str {
        "log"
    }

    fn execute(&self, job: &Job, _ctx: &mut CommandContext) -> procx_core::Result<()> {
        tracing::info!(
            component = module_path!(),
            job_id = %job.id,
            payload = %job.payload,
            "log job executed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_variable_json_and_string() {
        assert_eq!(
            parse_variable("amount=250").unwrap(),
            ("amount".to_string(), json!(250))
        );
        assert_eq!(
            parse_variable("approved=true").unwrap(),
            ("approved".to_string(), json!(true))
        );
        assert_eq!(
            parse_variable("note=needs review").unwrap(),
            ("note".to_string(), json!("needs review"))
        );
        assert!(parse_variable("novalue").is_err());
        assert!(parse_variable("=1").is_err());
    }
}
