//! Worker pool executing hunt attempts.
//!
//! Jobs wait in a priority queue (higher priority first, FIFO within equal
//! priority) and run as tokio tasks, at most `target` at a time. Outcomes
//! go back to the coordination context over an unbounded channel; the pool
//! itself never touches the registry.

use crate::connectivity::{CellularGeneration, NetworkKind};
use crate::hunter::{HuntJob, HuntOutcome};
use crate::request::Priority;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Runs hunt attempts off the coordination context.
pub trait HuntExecutor: Send + Sync {
    /// Queues one attempt; its outcome is reported asynchronously.
    fn execute(&self, job: HuntJob);

    /// Resizes for the link carrying the connection.
    fn adjust_for(&self, kind: NetworkKind);

    fn pool_size(&self) -> usize;
}

/// Concurrency suited to a link type.
///
/// Unknown links use the configured default.
pub fn pool_size_for(kind: NetworkKind, default: usize) -> usize {
    match kind {
        NetworkKind::Wifi | NetworkKind::Ethernet => 4,
        NetworkKind::Cellular(CellularGeneration::G5) => 4,
        NetworkKind::Cellular(CellularGeneration::G4) => 3,
        NetworkKind::Cellular(CellularGeneration::G3) => 2,
        NetworkKind::Cellular(CellularGeneration::G2) => 1,
        NetworkKind::Unknown => default,
    }
}

/// A job waiting for a worker slot.
struct QueuedJob {
    job: HuntJob,
    priority: Priority,
    sequence: u64,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then lower sequence (older) first
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other_ordering => other_ordering,
        }
    }
}

struct PoolQueue {
    waiting: BinaryHeap<QueuedJob>,
    sequence: u64,
    active: usize,
    target: usize,
}

struct PoolInner {
    queue: Mutex<PoolQueue>,
    outcome_tx: mpsc::UnboundedSender<HuntOutcome>,
    default_size: usize,
}

impl PoolInner {
    /// Starts waiting jobs while slots are free.
    fn pump(self: &Arc<Self>) {
        // Slots released while the runtime tears down have nowhere to run
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        loop {
            let next = {
                let mut queue = self.queue.lock();
                if queue.active >= queue.target {
                    None
                } else {
                    let next = queue.waiting.pop();
                    if next.is_some() {
                        queue.active += 1;
                    }
                    next
                }
            };

            let Some(queued) = next else {
                break;
            };

            let slot = ActiveSlot {
                inner: Arc::clone(self),
            };
            let outcome_tx = self.outcome_tx.clone();
            runtime.spawn(async move {
                let _slot = slot;
                trace!(
                    hunter = %queued.job.hunter_id(),
                    key = %queued.job.key(),
                    "Hunt attempt starting"
                );
                let outcome = queued.job.run().await;
                if outcome_tx.send(outcome).is_err() {
                    debug!("Dispatcher gone, dropping hunt outcome");
                }
            });
        }
    }
}

/// Releases a worker slot when the attempt ends, including by panic.
struct ActiveSlot {
    inner: Arc<PoolInner>,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.inner.queue.lock().active -= 1;
        self.inner.pump();
    }
}

/// Bounded, priority-ordered executor for hunt attempts.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Creates a pool reporting outcomes on `outcome_tx`.
    ///
    /// Must be used from within a tokio runtime.
    pub fn new(pool_size: usize, outcome_tx: mpsc::UnboundedSender<HuntOutcome>) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            inner: Arc::new(PoolInner {
                queue: Mutex::new(PoolQueue {
                    waiting: BinaryHeap::new(),
                    sequence: 0,
                    active: 0,
                    target: pool_size,
                }),
                outcome_tx,
                default_size: pool_size,
            }),
        }
    }

    /// Attempts currently running.
    pub fn active(&self) -> usize {
        self.inner.queue.lock().active
    }

    /// Attempts waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().waiting.len()
    }

    pub fn set_pool_size(&self, size: usize) {
        let size = size.max(1);
        {
            let mut queue = self.inner.queue.lock();
            if queue.target == size {
                return;
            }
            debug!(from = queue.target, to = size, "Resizing worker pool");
            queue.target = size;
        }
        self.inner.pump();
    }
}

impl HuntExecutor for WorkerPool {
    fn execute(&self, job: HuntJob) {
        {
            let mut queue = self.inner.queue.lock();
            let sequence = queue.sequence;
            queue.sequence += 1;
            let priority = job.priority();
            queue.waiting.push(QueuedJob {
                job,
                priority,
                sequence,
            });
        }
        self.inner.pump();
    }

    fn adjust_for(&self, kind: NetworkKind) {
        self.set_pool_size(pool_size_for(kind, self.inner.default_size));
    }

    fn pool_size(&self) -> usize {
        self.inner.queue.lock().target
    }
}
