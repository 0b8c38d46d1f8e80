//! Cache trait definition for dependency injection.

use crate::cache::types::CacheError;
use crate::cache::CacheStats;
use crate::request::RequestKey;
use crate::result::Bitmap;

/// Memory cache abstraction for decoded bitmaps.
///
/// Implementations synchronise internally; the dispatcher, the workers and
/// the caller-facing loader all share one instance.
///
/// # Example
///
/// ```
/// use imgload::cache::{Cache, MemoryCache};
/// use imgload::request::Request;
/// use imgload::result::Bitmap;
///
/// fn warm(cache: &dyn Cache, request: &Request, bitmap: Bitmap) {
///     if cache.get(request.key()).is_none() {
///         cache.put(request.key().clone(), bitmap).ok();
///     }
/// }
///
/// let cache = MemoryCache::new(1024 * 1024);
/// let request = Request::uri("https://example.com/a.png").build().unwrap();
/// warm(&cache, &request, Bitmap::new(image::RgbaImage::new(2, 2)));
/// assert!(cache.contains(request.key()));
/// ```
pub trait Cache: Send + Sync {
    /// Get the cached bitmap for the given key, marking it recently used.
    fn get(&self, key: &RequestKey) -> Option<Bitmap>;

    /// Store a bitmap, evicting older entries as needed.
    fn put(&self, key: RequestKey, bitmap: Bitmap) -> Result<(), CacheError>;

    /// Check if a key exists without touching recency.
    fn contains(&self, key: &RequestKey) -> bool;

    fn clear(&self);

    /// Remove every entry derived from the given source URI.
    ///
    /// Returns the number of entries removed.
    fn clear_source(&self, uri: &str) -> usize;

    fn size_bytes(&self) -> usize;

    fn max_size_bytes(&self) -> usize;

    fn stats(&self) -> CacheStats;
}

/// Cache implementation that never stores anything.
///
/// Useful for tests and for measuring behaviour without caching.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

impl NoOpCache {
    pub fn new() -> Self {
        Self
    }
}

impl Cache for NoOpCache {
    fn get(&self, _key: &RequestKey) -> Option<Bitmap> {
        None // Always miss
    }

    fn put(&self, _key: RequestKey, _bitmap: Bitmap) -> Result<(), CacheError> {
        Ok(()) // Accept but don't store
    }

    fn contains(&self, _key: &RequestKey) -> bool {
        false
    }

    fn clear(&self) {}

    fn clear_source(&self, _uri: &str) -> usize {
        0
    }

    fn size_bytes(&self) -> usize {
        0
    }

    fn max_size_bytes(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats {
        CacheStats::new()
    }
}
