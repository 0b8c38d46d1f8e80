//! Core types for the memory cache.

use thiserror::Error;

/// Default memory cache budget: 64 MB.
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// Cache-related errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The entry alone exceeds the whole budget and was not stored.
    #[error("Entry of {size} bytes exceeds cache budget of {limit} bytes")]
    EntryTooLarge { size: usize, limit: usize },
}

/// Memory cache configuration.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum pixel bytes held (default: 64 MB).
    pub max_size_bytes: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MEMORY_CACHE_SIZE,
        }
    }
}

impl MemoryCacheConfig {
    pub fn new(max_size_bytes: usize) -> Self {
        Self { max_size_bytes }
    }
}
