//! Dispatcher counters and registry snapshots.

use crate::action::Tag;
use crate::request::RequestKey;

/// Lifetime counters of one dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Actions received by submit, including replays and resumes.
    pub submitted: u64,
    /// Submissions that joined an existing hunter.
    pub coalesced: u64,
    pub hunters_created: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
    pub replayed: u64,
    pub paused: u64,
    pub resumed: u64,
    pub cancelled: u64,
    /// Actions dropped because their target was reclaimed.
    pub reaped: u64,
    /// Submissions refused after shutdown.
    pub rejected: u64,
}

impl DispatchStats {
    /// Fraction of submissions that did not start new work.
    pub fn coalesce_rate(&self) -> f64 {
        if self.submitted == 0 {
            0.0
        } else {
            self.coalesced as f64 / self.submitted as f64
        }
    }
}

/// Point-in-time view of the dispatcher's registries.
#[derive(Debug, Clone, Default)]
pub struct DispatchSnapshot {
    /// Live hunters as `(key, attached action count)`, sorted by key.
    pub hunters: Vec<(RequestKey, usize)>,
    pub paused_tags: Vec<Tag>,
    pub paused_actions: usize,
    pub failed_actions: usize,
    pub pool_size: usize,
    pub is_shutdown: bool,
    pub stats: DispatchStats,
}

impl DispatchSnapshot {
    pub fn hunter_count(&self) -> usize {
        self.hunters.len()
    }

    /// Attached actions for a key, if a hunter is live.
    pub fn actions_for(&self, key: &RequestKey) -> Option<usize> {
        self.hunters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, count)| *count)
    }

    pub fn is_paused(&self, tag: &Tag) -> bool {
        self.paused_tags.contains(tag)
    }
}
