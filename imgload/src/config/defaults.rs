//! Default values for every configuration setting.

use std::path::PathBuf;

use super::settings::*;
use crate::cache::DEFAULT_MEMORY_CACHE_SIZE;
use crate::dispatcher::{DEFAULT_POOL_SIZE, DEFAULT_REAP_INTERVAL};
use crate::logging::{DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
use crate::strategy::{DEFAULT_NETWORK_RETRY_COUNT, DEFAULT_NETWORK_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Largest accepted worker pool.
pub const MAX_POOL_SIZE: usize = 64;

/// Smallest accepted reap interval; shorter sweeps only burn CPU.
pub const MIN_REAP_INTERVAL_MS: u64 = 50;

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_CACHE_SIZE,
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            reap_interval_ms: DEFAULT_REAP_INTERVAL.as_millis() as u64,
            scan_network_changes: true,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_NETWORK_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry_count: DEFAULT_NETWORK_RETRY_COUNT,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            dispatcher: DispatcherSettings::default(),
            network: NetworkSettings::default(),
            assets: AssetSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
