//! Process instance commands
//!
//! Usage: procx process start <KEY> [--business-key <KEY>] [--var NAME=VALUE]...
//!        procx process suspend|activate <ID>
//!        procx process delete <ID> [--reason <TEXT>]

use clap::{Args, Subcommand};
use serde_json::Value;

use super::{parse_variable, variables, Context};

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(subcommand)]
    pub command: ProcessCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProcessCommand {
    /// Start a process instance
    Start {
        process_definition_key: String,
        #[arg(long)]
        business_key: Option<String>,
        /// Initial variable, repeatable
        #[arg(long = "var", value_parser = parse_variable)]
        vars: Vec<(String, Value)>,
    },
    /// Suspend an instance with its tasks and jobs
    Suspend { id: String },
    /// Activate a suspended instance
    Activate { id: String },
    /// Delete an instance with its tasks, jobs and variables
    Delete {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

pub fn execute(ctx: &Context, args: ProcessArgs) -> anyhow::Result<()> {
    let runtime = ctx.runtime();
    match args.command {
        ProcessCommand::Start {
            process_definition_key,
            business_key,
            vars,
        } => {
            let instance = runtime.start_process_instance(
                &process_definition_key,
                business_key.as_deref(),
                variables(vars),
            )?;
            println!("{}", instance.id);
        }
        ProcessCommand::Suspend { id } => {
            runtime.suspend_process_instance(&id)?;
            println!("Suspended {id}");
        }
        ProcessCommand::Activate { id } => {
            runtime.activate_process_instance(&id)?;
            println!("Activated {id}");
        }
        ProcessCommand::Delete { id, reason } => {
            runtime.delete_process_instance(&id, reason.as_deref())?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}
