//! Grant commands
//!
//! Usage: procx grant add (--to-user <ID> | --to-group <ID>) <PERMISSION> <RESOURCE_TYPE> [RESOURCE_ID]
//!        procx grant list

use anyhow::anyhow;
use clap::{Args, Subcommand};
use procx_core::authorization::{Grant, ANY};
use procx_core::{Permission, ResourceType};

use super::{print_json, Context};

#[derive(Debug, Args)]
pub struct GrantArgs {
    #[command(subcommand)]
    pub command: GrantCommand,
}

#[derive(Debug, Subcommand)]
pub enum GrantCommand {
    /// Grant a permission to a user or group
    Add {
        #[arg(long, conflicts_with = "to_group", required_unless_present = "to_group")]
        to_user: Option<String>,
        #[arg(long)]
        to_group: Option<String>,
        /// READ, UPDATE, DELETE, CREATE or ALL
        permission: String,
        /// PROCESS_INSTANCE, TASK, JOB or OPERATION_LOG
        resource_type: String,
        /// Defaults to every resource of the type
        #[arg(default_value = ANY)]
        resource_id: String,
    },
    /// Print all grants as JSON
    List,
}

pub fn execute(ctx: &Context, args: GrantArgs) -> anyhow::Result<()> {
    let grants = ctx
        .engine
        .grants()
        .ok_or_else(|| anyhow!("engine has no grant table"))?;

    match args.command {
        GrantCommand::Add {
            to_user,
            to_group,
            permission,
            resource_type,
            resource_id,
        } => {
            let permission: Permission = permission.parse()?;
            let resource_type: ResourceType = resource_type.parse()?;
            let grant = match (to_user, to_group) {
                (Some(user), _) => Grant::user(user, permission, resource_type, resource_id),
                (None, Some(group)) => Grant::group(group, permission, resource_type, resource_id),
                (None, None) => return Err(anyhow!("one of --to-user or --to-group is required")),
            };
            grants.add_grant(&grant)?;
            println!("Granted {permission} on {resource_type} {}", grant.resource_id);
            Ok(())
        }
        GrantCommand::List => print_json(&grants.list_grants()?),
    }
}
