//! Job commands
//!
//! Usage: procx job create <TYPE> [--id <ID>] [--process-instance <ID>] [--retries <N>] [--payload <JSON>]
//!        procx job set-retries <ID> <N>
//!        procx job delete <ID>
//!        procx job list [--process-instance <ID>] [--type <TYPE>]
//!        procx job run [--once]

use clap::{Args, Subcommand};
use procx_core::commands::CreateJobCmd;

use super::{parse_value, print_json, Context};

#[derive(Debug, Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Create a job
    Create {
        job_type: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        process_instance: Option<String>,
        #[arg(long)]
        retries: Option<i32>,
        #[arg(long)]
        payload: Option<String>,
    },
    /// Set the remaining retries of a job
    SetRetries {
        id: String,
        #[arg(allow_negative_numbers = true)]
        retries: i32,
    },
    /// Delete a job that is not being executed
    Delete { id: String },
    /// List jobs as JSON
    List {
        #[arg(long)]
        process_instance: Option<String>,
        #[arg(long = "type")]
        job_type: Option<String>,
    },
    /// Acquire and execute due jobs
    Run {
        /// A single acquisition pass instead of running until idle
        #[arg(long)]
        once: bool,
    },
}

pub fn execute(ctx: &Context, args: JobArgs) -> anyhow::Result<()> {
    let management = ctx.management();
    match args.command {
        JobCommand::Create {
            job_type,
            id,
            process_instance,
            retries,
            payload,
        } => {
            let mut cmd = CreateJobCmd::new(job_type);
            if let Some(id) = id {
                cmd = cmd.with_id(id);
            }
            if let Some(pi) = process_instance {
                cmd = cmd.for_process_instance(pi);
            }
            if let Some(retries) = retries {
                cmd = cmd.with_retries(retries);
            }
            if let Some(payload) = payload {
                cmd = cmd.with_payload(parse_value(&payload));
            }
            let job = management.create_job(&cmd)?;
            println!("{}", job.id);
        }
        JobCommand::SetRetries { id, retries } => {
            management.set_job_retries(&id, retries)?;
            println!("Set retries of {id} to {retries}");
        }
        JobCommand::Delete { id } => {
            management.delete_job(&id)?;
            println!("Deleted {id}");
        }
        JobCommand::List {
            process_instance,
            job_type,
        } => {
            let jobs = management.list_jobs(process_instance.as_deref(), job_type.as_deref())?;
            print_json(&jobs)?;
        }
        JobCommand::Run { once } => {
            let report = if once {
                ctx.engine.job_executor().run_once()?
            } else {
                management.execute_due_jobs()?
            };
            println!(
                "acquired={} completed={} failed={} skipped={}",
                report.acquired, report.completed, report.failed, report.skipped
            );
        }
    }
    Ok(())
}
