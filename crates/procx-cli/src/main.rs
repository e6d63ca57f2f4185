//! procx CLI
//!
//! Drives a SQLite-backed process engine from the command line

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "procx")]
#[command(about = "procx - Process engine command core", long_about = None)]
struct Cli {
    /// SQLite database file; overrides `database.path` from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run as this user instead of the system
    #[arg(long, global = true)]
    user: Option<String>,

    /// Groups of `--user`, comma separated
    #[arg(long, global = true, value_delimiter = ',', requires = "user")]
    groups: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database and apply migrations
    Init,
    /// Process instance operations
    Process(commands::process::ProcessArgs),
    /// User task operations
    Task(commands::task::TaskArgs),
    /// Job operations
    Job(commands::job::JobArgs),
    /// Process variable operations
    Variable(commands::variable::VariableArgs),
    /// Operation log queries
    Oplog(commands::oplog::OplogArgs),
    /// Authorization grants
    Grant(commands::grant::GrantArgs),
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = commands::Context::open(
        cli.db.as_deref(),
        cli.config.as_deref(),
        cli.user,
        cli.groups,
    )?;

    match cli.command {
        Commands::Init => commands::init(&ctx),
        Commands::Process(args) => commands::process::execute(&ctx, args),
        Commands::Task(args) => commands::task::execute(&ctx, args),
        Commands::Job(args) => commands::job::execute(&ctx, args),
        Commands::Variable(args) => commands::variable::execute(&ctx, args),
        Commands::Oplog(args) => commands::oplog::execute(&ctx, args),
        Commands::Grant(args) => commands::grant::execute(&ctx, args),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
