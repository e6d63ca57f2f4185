use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use procx_core::commands::JobHandler;
use procx_core::model::Job;
use procx_core::{CommandContext, CommandError, Result};
use procx_engine::EngineConfig;
use serde_json::json;

/// Marks the job's process instance with `sent = true` and counts runs
#[derive(Default)]
#[allow(dead_code)]
pub struct EmailHandler {
    pub runs: AtomicUsize,
}

impl JobHandler for EmailHandler {
    fn job_type(&self) -> &str {
        "email"
    }

    fn execute(&self, job: &Job, ctx: &mut CommandContext) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(pi) = &job.process_instance_id {
            ctx.variables().set(pi, "sent", json!(true))?;
        }
        Ok(())
    }
}

/// Always fails
#[allow(dead_code)]
pub struct FailingHandler;

impl JobHandler for FailingHandler {
    fn job_type(&self) -> &str {
        "flaky"
    }

    fn execute(&self, job: &Job, _ctx: &mut CommandContext) -> Result<()> {
        Err(CommandError::JobFailure {
            job_id: job.id.clone(),
            message: "smtp down".to_string(),
        })
    }
}

#[allow(dead_code)]
pub fn email_handler() -> Arc<EmailHandler> {
    Arc::new(EmailHandler::default())
}

#[allow(dead_code)]
pub fn sqlite_config(dir: &Path) -> EngineConfig {
    EngineConfig::default().with_database_path(dir.join("procx.db"))
}
