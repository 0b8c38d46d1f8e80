//! Per-request cache and scheduling policies.

use std::ops::BitOr;

/// Controls how a request interacts with the memory cache.
///
/// Flags combine with `|`:
///
/// ```
/// use imgload::request::MemoryPolicy;
///
/// let policy = MemoryPolicy::NO_CACHE | MemoryPolicy::NO_STORE;
/// assert!(!policy.should_read());
/// assert!(!policy.should_write());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryPolicy(u8);

impl MemoryPolicy {
    /// Read from and write to the memory cache.
    pub const DEFAULT: Self = Self(0);
    /// Skip the memory cache lookup.
    pub const NO_CACHE: Self = Self(1 << 0);
    /// Do not store the result in the memory cache.
    pub const NO_STORE: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether a cached result may satisfy the request.
    pub fn should_read(self) -> bool {
        !self.contains(Self::NO_CACHE)
    }

    /// Whether the decoded result may be written to the cache.
    pub fn should_write(self) -> bool {
        !self.contains(Self::NO_STORE)
    }
}

impl BitOr for MemoryPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Controls how a network load treats HTTP caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NetworkPolicy(u8);

impl NetworkPolicy {
    pub const DEFAULT: Self = Self(0);
    /// Force a fresh response, bypassing intermediary caches.
    pub const NO_CACHE: Self = Self(1 << 0);
    /// Ask intermediaries not to store the response.
    pub const NO_STORE: Self = Self(1 << 1);
    /// Never touch the network.
    pub const OFFLINE: Self = Self(1 << 2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn should_read_from_cache(self) -> bool {
        !self.contains(Self::NO_CACHE)
    }

    pub fn should_write_to_cache(self) -> bool {
        !self.contains(Self::NO_STORE)
    }

    pub fn is_offline_only(self) -> bool {
        self.contains(Self::OFFLINE)
    }
}

impl BitOr for NetworkPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Scheduling priority of a request.
///
/// Higher priorities leave the worker queue first; equal priorities are FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}
