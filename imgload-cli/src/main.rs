//! imgload CLI - Command-line interface
//!
//! Loads images through the imgload dispatcher and manages its
//! configuration file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::load::LoadArgs;
use error::CliError;
use runner::CliRunner;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imgload")]
#[command(version = imgload::VERSION)]
#[command(about = "Load, transform and cache images", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.imgload/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one or more images
    Load(LoadArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Load(args) => {
            let runner = CliRunner::new(cli.config.as_deref())?;
            commands::load::run(&runner, args).await
        }
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    }
}
