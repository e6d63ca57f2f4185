//! Process variable commands
//!
//! Usage: procx variable set <PROCESS_INSTANCE> <NAME> <VALUE>
//!        procx variable remove <PROCESS_INSTANCE> <NAME>
//!        procx variable list <PROCESS_INSTANCE>

use clap::{Args, Subcommand};

use super::{parse_value, print_json, Context};

#[derive(Debug, Args)]
pub struct VariableArgs {
    #[command(subcommand)]
    pub command: VariableCommand,
}

#[derive(Debug, Subcommand)]
pub enum VariableCommand {
    /// Set a variable; VALUE is JSON, or a plain string
    Set {
        process_instance: String,
        name: String,
        value: String,
    },
    /// Remove a variable
    Remove {
        process_instance: String,
        name: String,
    },
    /// Print all variables as JSON
    List { process_instance: String },
}

pub fn execute(ctx: &Context, args: VariableArgs) -> anyhow::Result<()> {
    let runtime = ctx.runtime();
    match args.command {
        VariableCommand::Set {
            process_instance,
            name,
            value,
        } => {
            runtime.set_variable(&process_instance, &name, parse_value(&value))?;
            println!("Set {name}");
        }
        VariableCommand::Remove {
            process_instance,
            name,
        } => match runtime.remove_variable(&process_instance, &name)? {
            Some(_) => println!("Removed {name}"),
            None => println!("No variable {name}"),
        },
        VariableCommand::List { process_instance } => {
            print_json(&runtime.get_variables(&process_instance)?)?;
        }
    }
    Ok(())
}
