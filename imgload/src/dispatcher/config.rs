//! Dispatcher configuration.

use std::time::Duration;

// =============================================================================
// Configuration Constants
// =============================================================================

/// Default number of concurrent hunts.
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Default interval between sweeps for reclaimed targets.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(1000);

// =============================================================================
// Dispatcher Configuration
// =============================================================================

/// Configuration for the dispatcher and its worker pool.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Concurrent hunts when the link type is unknown.
    pub pool_size: usize,

    /// How often paused and failed buffers are swept for dead targets.
    pub reap_interval: Duration,

    /// Observe connectivity for retry, replay and pool sizing.
    ///
    /// Only effective when the connectivity monitor has permission.
    pub scan_network_changes: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            reap_interval: DEFAULT_REAP_INTERVAL,
            scan_network_changes: true,
        }
    }
}

impl DispatcherConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn with_network_scanning(mut self, enabled: bool) -> Self {
        self.scan_network_changes = enabled;
        self
    }
}
