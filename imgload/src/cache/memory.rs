//! In-memory bitmap cache with LRU eviction.

use crate::cache::types::{CacheError, MemoryCacheConfig};
use crate::cache::{Cache, CacheStats};
use crate::request::RequestKey;
use crate::result::Bitmap;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Entry in the memory cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    bitmap: Bitmap,
    /// Logical access time for LRU eviction
    last_accessed: u64,
}

impl CacheEntry {
    fn new(bitmap: Bitmap, now: u64) -> Self {
        Self {
            bitmap,
            last_accessed: now,
        }
    }

    fn touch(&mut self, now: u64) {
        self.last_accessed = now;
    }

    fn size(&self) -> usize {
        self.bitmap.byte_count()
    }
}

struct Inner {
    entries: HashMap<RequestKey, CacheEntry>,
    current_size_bytes: usize,
    /// Monotonic access clock; strictly orders accesses even within one instant.
    clock: u64,
    stats: CacheStats,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &RequestKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.current_size_bytes = self.current_size_bytes.saturating_sub(entry.size());
        Some(entry)
    }

    fn refresh_stats(&mut self) {
        let (size, count) = (self.current_size_bytes, self.entries.len());
        self.stats.update_size(size, count);
    }
}

/// Bounded key → bitmap store.
///
/// The budget counts pixel bytes. Inserting past the budget evicts least
/// recently used entries first; an entry larger than the whole budget is
/// refused.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
}

impl MemoryCache {
    /// Create a new memory cache with the given size limit in bytes.
    pub fn new(max_size_bytes: usize) -> Self {
        let mut stats = CacheStats::new();
        stats.max_size_bytes = max_size_bytes;
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                current_size_bytes: 0,
                clock: 0,
                stats,
            }),
            max_size_bytes,
        }
    }

    pub fn with_config(config: &MemoryCacheConfig) -> Self {
        Self::new(config.max_size_bytes)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Evict least recently used entries until `required` more bytes fit.
    fn evict_lru_until_fits(inner: &mut Inner, max_size_bytes: usize, required: usize) {
        if inner.current_size_bytes + required <= max_size_bytes {
            return;
        }
        let target_size = max_size_bytes.saturating_sub(required);

        // Oldest first
        let mut candidates: Vec<(RequestKey, u64)> = inner
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.last_accessed))
            .collect();
        candidates.sort_by_key(|(_, accessed)| *accessed);

        let mut evicted = 0;
        for (key, _) in candidates {
            if inner.current_size_bytes <= target_size {
                break;
            }
            inner.remove(&key);
            evicted += 1;
        }

        if evicted > 0 {
            inner.stats.record_eviction(evicted);
            tracing::debug!(
                evicted,
                size_bytes = inner.current_size_bytes,
                "Memory cache evicted LRU entries"
            );
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &RequestKey) -> Option<Bitmap> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = inner.tick();

        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                let bitmap = entry.bitmap.clone();
                inner.stats.record_hit();
                Some(bitmap)
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    fn put(&self, key: RequestKey, bitmap: Bitmap) -> Result<(), CacheError> {
        let size = bitmap.byte_count();
        let mut inner = self.inner.lock();

        // A replaced entry must not count against the new one.
        inner.remove(&key);

        if size > self.max_size_bytes {
            inner.refresh_stats();
            return Err(CacheError::EntryTooLarge {
                size,
                limit: self.max_size_bytes,
            });
        }

        Self::evict_lru_until_fits(&mut inner, self.max_size_bytes, size);

        let now = inner.tick();
        inner.entries.insert(key, CacheEntry::new(bitmap, now));
        inner.current_size_bytes += size;
        inner.stats.record_put();
        inner.refresh_stats();
        Ok(())
    }

    fn contains(&self, key: &RequestKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_size_bytes = 0;
        inner.refresh_stats();
    }

    fn clear_source(&self, uri: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<RequestKey> = inner
            .entries
            .keys()
            .filter(|key| key.is_for_source(uri))
            .cloned()
            .collect();
        for key in &doomed {
            inner.remove(key);
        }
        inner.refresh_stats();
        doomed.len()
    }

    fn size_bytes(&self) -> usize {
        self.inner.lock().current_size_bytes
    }

    fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }
}
