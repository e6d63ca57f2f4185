//! Operation log commands
//!
//! Usage: procx oplog list [--entity-id <ID>] [--process-instance <ID>] [--user-id <USER>] [--operation-type <TYPE>]

use clap::{Args, Subcommand};
use procx_core::managers::OperationLogQuery;

use super::{print_json, Context};

#[derive(Debug, Args)]
pub struct OplogArgs {
    #[command(subcommand)]
    pub command: OplogCommand,
}

#[derive(Debug, Subcommand)]
pub enum OplogCommand {
    /// Print matching entries as JSON, oldest first
    List {
        #[arg(long)]
        entity_id: Option<String>,
        #[arg(long)]
        process_instance: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        operation_type: Option<String>,
    },
}

pub fn execute(ctx: &Context, args: OplogArgs) -> anyhow::Result<()> {
    match args.command {
        OplogCommand::List {
            entity_id,
            process_instance,
            user_id,
            operation_type,
        } => {
            let entries = ctx.history().operation_log(OperationLogQuery {
                entity_id,
                process_instance_id: process_instance,
                user_id,
                operation_type,
                ..OperationLogQuery::default()
            })?;
            print_json(&entries)
        }
    }
}
