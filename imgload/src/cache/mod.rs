//! Memory cache for decoded bitmaps.
//!
//! Provides a byte-budgeted LRU store keyed by [`RequestKey`], statistics
//! tracking, and a no-op implementation for tests.
//!
//! [`RequestKey`]: crate::request::RequestKey

mod memory;
mod stats;
mod r#trait;
mod types;

pub use memory::MemoryCache;
pub use r#trait::{Cache, NoOpCache};
pub use stats::CacheStats;
pub use types::{CacheError, MemoryCacheConfig, DEFAULT_MEMORY_CACHE_SIZE};
