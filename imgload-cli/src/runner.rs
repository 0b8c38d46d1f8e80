//! CLI runner for common setup.
//!
//! Loads the configuration file and initializes logging once, so command
//! handlers start from the same state.

use crate::error::CliError;
use imgload::config::ConfigFile;
use imgload::logging::{init_logging, LoggingGuard};
use std::path::Path;
use tracing::info;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Keeps the log file writer alive while the runner exists
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads `config_path` (or the default config file) and starts logging.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("imgload v{}", imgload::VERSION);
        info!(
            log_file = %self.logging_guard.path().display(),
            "imgload CLI: {} command", command
        );
    }
}
