//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init`.

use clap::Subcommand;
use imgload::config::{config_file_path, format_size, ConfigFile};
use std::path::Path;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
///
/// `config_path` overrides the default file location.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;

    println!("Configuration ({})", path.display());
    println!("======================");
    println!();
    for (section, entries) in settings(&config) {
        println!("[{}]", section);
        for (key, value) in entries {
            println!("  {:<22} {}", key, value);
        }
        println!();
    }

    if !path.exists() {
        println!("(file not found, showing defaults)");
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

type Section = (&'static str, Vec<(&'static str, String)>);

fn settings(config: &ConfigFile) -> Vec<Section> {
    vec![
        (
            "cache",
            vec![("memory_size", format_size(config.cache.memory_size))],
        ),
        (
            "dispatcher",
            vec![
                ("pool_size", config.dispatcher.pool_size.to_string()),
                (
                    "reap_interval_ms",
                    config.dispatcher.reap_interval_ms.to_string(),
                ),
                (
                    "scan_network_changes",
                    config.dispatcher.scan_network_changes.to_string(),
                ),
            ],
        ),
        (
            "network",
            vec![
                ("timeout", format!("{}s", config.network.timeout)),
                ("user_agent", config.network.user_agent.clone()),
                ("retry_count", config.network.retry_count.to_string()),
            ],
        ),
        (
            "assets",
            vec![(
                "directory",
                config
                    .assets
                    .directory
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string()),
            )],
        ),
        (
            "logging",
            vec![
                ("enabled", config.logging.enabled.to_string()),
                ("directory", config.logging.directory.display().to_string()),
                ("file", config.logging.file.clone()),
            ],
        ),
    ]
}
