//! Configuration file handling for ~/.imgload/config.ini.
//!
//! Settings structs live in [`super::settings`], defaults in
//! [`super::defaults`], parsing in [`super::parser`], and serialization in
//! [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::dispatcher::DispatcherConfig;
use crate::loader::ImageLoaderBuilder;
use crate::strategy::NetworkStrategyConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.imgload/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::default()
            .with_pool_size(self.dispatcher.pool_size)
            .with_reap_interval(Duration::from_millis(self.dispatcher.reap_interval_ms))
            .with_network_scanning(self.dispatcher.scan_network_changes)
    }

    pub fn network_config(&self) -> NetworkStrategyConfig {
        NetworkStrategyConfig {
            timeout: Duration::from_secs(self.network.timeout),
            user_agent: self.network.user_agent.clone(),
            retry_count: self.network.retry_count,
        }
    }

    /// A loader builder carrying every setting in this file.
    pub fn loader_builder(&self) -> ImageLoaderBuilder {
        let builder = ImageLoaderBuilder::new()
            .with_dispatcher_config(self.dispatcher_config())
            .with_memory_cache_size(self.cache.memory_size)
            .with_network_config(self.network_config())
            .with_logging(self.logging.enabled);

        match &self.assets.directory {
            Some(root) => builder.with_asset_root(root.clone()),
            None => builder,
        }
    }
}

/// Get the path to the config directory (~/.imgload).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".imgload")
}

/// Get the path to the config file (~/.imgload/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
