//! User configuration.
//!
//! Settings are read from `~/.imgload/config.ini`, one INI section per
//! concern. Any key left out keeps its default, and a missing file is the
//! same as an empty one.
//!
//! # Example
//!
//! ```no_run
//! use imgload::config::ConfigFile;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::load()?;
//! let loader = config.loader_builder().start()?;
//! # Ok(())
//! # }
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{MAX_POOL_SIZE, MIN_REAP_INTERVAL_MS};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AssetSettings, CacheSettings, ConfigFile, DispatcherSettings, LoggingSettings,
    NetworkSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
