//! User task commands
//!
//! Usage: procx task create <NAME> [--process-instance <ID>]
//!        procx task claim <ID> [--assignee <USER>]
//!        procx task complete <ID> [--var NAME=VALUE]...

use anyhow::anyhow;
use clap::{Args, Subcommand};
use serde_json::Value;

use super::{parse_variable, print_json, variables, Context};

#[derive(Debug, Args)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Create a task
    Create {
        name: String,
        #[arg(long)]
        process_instance: Option<String>,
    },
    /// Show a task
    Show { id: String },
    /// Claim a task; the assignee defaults to --user
    Claim {
        id: String,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Complete a task, passing variables to its process instance
    Complete {
        id: String,
        #[arg(long = "var", value_parser = parse_variable)]
        vars: Vec<(String, Value)>,
    },
}

pub fn execute(ctx: &Context, args: TaskArgs) -> anyhow::Result<()> {
    let tasks = ctx.tasks();
    match args.command {
        TaskCommand::Create {
            name,
            process_instance,
        } => {
            let task = tasks.create_task(&name, process_instance.as_deref())?;
            println!("{}", task.id);
        }
        TaskCommand::Show { id } => print_json(&tasks.get_task(&id)?)?,
        TaskCommand::Claim { id, assignee } => {
            let assignee = assignee
                .or_else(|| ctx.authentication.as_ref().map(|a| a.user_id.clone()))
                .ok_or_else(|| anyhow!("claim needs --assignee or --user"))?;
            tasks.claim(&id, &assignee)?;
            println!("Claimed {id} for {assignee}");
        }
        TaskCommand::Complete { id, vars } => {
            tasks.complete(&id, variables(vars))?;
            println!("Completed {id}");
        }
    }
    Ok(())
}
