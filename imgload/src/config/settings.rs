//! Settings structs, one per `[section]` of config.ini.

use std::path::PathBuf;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub dispatcher: DispatcherSettings,
    pub network: NetworkSettings,
    pub assets: AssetSettings,
    pub logging: LoggingSettings,
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Memory cache budget in bytes.
    pub memory_size: usize,
}

/// `[dispatcher]`
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    /// Concurrent hunts on an unknown link.
    pub pool_size: usize,
    /// Interval between sweeps for reclaimed targets.
    pub reap_interval_ms: u64,
    /// Observe connectivity for retries, replay and pool sizing.
    pub scan_network_changes: bool,
}

/// `[network]`
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    /// Request timeout in seconds.
    pub timeout: u64,
    pub user_agent: String,
    pub retry_count: u32,
}

/// `[assets]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssetSettings {
    /// Root for `asset:///` sources; asset loading is off when unset.
    pub directory: Option<PathBuf>,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Emit per-request lifecycle events.
    pub enabled: bool,
    pub directory: PathBuf,
    pub file: String,
}
