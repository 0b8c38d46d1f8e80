//! Hunters: the single in-flight unit of work for a request key.
//!
//! A [`Hunter`] lives in the dispatcher's registry and is only ever touched
//! from the coordination context. The part that runs on the worker pool is a
//! detached [`HuntJob`], which carries copies of everything it needs and
//! reports back with a [`HuntOutcome`] tagged by [`HunterId`]. An outcome whose
//! id no longer matches the registered hunter for its key is stale and must be
//! ignored.
//!
//! # State machine
//!
//! ```text
//! Pending ──► Running ──► Completed
//!    ▲           │
//!    │           ├──► FailedRetryable ──┐
//!    │           │                      │
//!    └───────────┼──────────────────────┘
//!                └──► FailedTerminal
//! ```
//!
//! Cancellation is orthogonal: once every action has detached, the hunter's
//! token is cancelled and the coordinator tears it down on its next touch.

use crate::action::Action;
use crate::cache::Cache;
use crate::error::LoadError;
use crate::request::{NetworkPolicy, Priority, Request, RequestKey};
use crate::result::{LoadResult, LoadedFrom};
use crate::strategy::LoadStrategy;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Identity of one hunter instance.
///
/// Distinguishes a hunter from a later one created for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HunterId(u64);

impl HunterId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HunterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

/// Retry-policy state of a hunter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunterState {
    Pending,
    Running,
    Completed,
    FailedRetryable,
    FailedTerminal,
}

/// The one unit of work for a key, plus the actions waiting on it.
pub struct Hunter {
    id: HunterId,
    key: RequestKey,
    request: Request,
    strategy: Arc<dyn LoadStrategy>,
    action: Option<Arc<Action>>,
    actions: Vec<Arc<Action>>,
    retry_count: u32,
    cancellation: CancellationToken,
    state: HunterState,
    result: Option<LoadResult>,
    error: Option<LoadError>,
    attempts: u32,
}

impl Hunter {
    pub fn new(id: HunterId, action: Arc<Action>, strategy: Arc<dyn LoadStrategy>) -> Self {
        Self {
            id,
            key: action.key().clone(),
            request: action.request().clone(),
            retry_count: strategy.retry_count(),
            strategy,
            action: Some(action),
            actions: Vec::new(),
            cancellation: CancellationToken::new(),
            state: HunterState::Pending,
            result: None,
            error: None,
            attempts: 0,
        }
    }

    pub fn id(&self) -> HunterId {
        self.id
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    /// Request the hunter executes; the first attached action's request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn strategy(&self) -> &Arc<dyn LoadStrategy> {
        &self.strategy
    }

    /// Primary action, if still attached.
    pub fn action(&self) -> Option<&Arc<Action>> {
        self.action.as_ref()
    }

    /// Actions that joined after the primary, in attach order.
    pub fn joined(&self) -> &[Arc<Action>] {
        &self.actions
    }

    /// Every attached action, primary first.
    pub fn actions(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.action.iter().chain(self.actions.iter())
    }

    pub fn action_count(&self) -> usize {
        self.actions().count()
    }

    pub fn has_actions(&self) -> bool {
        self.action.is_some() || !self.actions.is_empty()
    }

    pub fn state(&self) -> HunterState {
        self.state
    }

    pub fn result(&self) -> Option<&LoadResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Number of times the hunter has been handed to the worker pool.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Highest priority among attached actions.
    pub fn priority(&self) -> Priority {
        self.actions()
            .map(|action| action.request().priority())
            .max()
            .unwrap_or_default()
    }

    /// Space-separated log ids of every attached action.
    pub fn log_ids(&self) -> String {
        let ids: Vec<String> = self.actions().map(|action| action.log_id()).collect();
        if ids.is_empty() {
            self.request.log_id()
        } else {
            ids.join(" ")
        }
    }

    /// Attaches another action wanting the same key.
    pub fn attach(&mut self, action: Arc<Action>) {
        if self.action.is_none() {
            self.action = Some(action);
        } else {
            self.actions.push(action);
        }
    }

    /// Detaches an action; returns whether it was attached.
    pub fn detach(&mut self, action: &Action) -> bool {
        if self
            .action
            .as_ref()
            .is_some_and(|primary| primary.id() == action.id())
        {
            self.action = None;
            return true;
        }

        let before = self.actions.len();
        self.actions.retain(|joined| joined.id() != action.id());
        self.actions.len() != before
    }

    /// Detaches and returns every action matching `predicate`.
    pub fn detach_where(&mut self, mut predicate: impl FnMut(&Action) -> bool) -> Vec<Arc<Action>> {
        let mut detached = Vec::new();
        if self.action.as_ref().is_some_and(|a| predicate(a)) {
            detached.extend(self.action.take());
        }
        let (matched, kept): (Vec<_>, Vec<_>) =
            self.actions.drain(..).partition(|a| predicate(a));
        self.actions = kept;
        detached.extend(matched);
        detached
    }

    /// Cancels the hunter if no actions remain attached.
    ///
    /// Returns `true` when cancelled; the caller must then drop it from the
    /// registry.
    pub fn cancel(&mut self) -> bool {
        if self.has_actions() {
            return false;
        }
        self.cancellation.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Consumes one retry if any remain and asks the strategy.
    pub fn should_retry(&mut self, is_connected: bool) -> bool {
        if self.retry_count == 0 {
            return false;
        }
        self.retry_count -= 1;
        self.strategy.should_retry(is_connected)
    }

    pub fn supports_replay(&self) -> bool {
        self.strategy.supports_replay()
    }

    /// Forces the next attempt to bypass HTTP caches.
    pub fn force_network_policy(&mut self, policy: NetworkPolicy) {
        self.request = self.request.with_network_policy(policy);
    }

    /// Prepares the next execution attempt.
    pub fn job(&mut self, cache: Arc<dyn Cache>) -> HuntJob {
        self.state = HunterState::Running;
        self.attempts += 1;
        self.result = None;
        self.error = None;
        HuntJob {
            hunter_id: self.id,
            key: self.key.clone(),
            request: self.request.clone(),
            strategy: Arc::clone(&self.strategy),
            cancellation: self.cancellation.clone(),
            priority: self.priority(),
            cache,
        }
    }

    /// Records a successful attempt.
    pub fn complete(&mut self, result: LoadResult) {
        self.state = HunterState::Completed;
        self.error = None;
        self.result = Some(result);
    }

    /// Records a failed attempt; `retryable` selects the failure state.
    pub fn fail(&mut self, error: LoadError, retryable: bool) {
        self.state = if retryable {
            HunterState::FailedRetryable
        } else {
            HunterState::FailedTerminal
        };
        self.result = None;
        self.error = Some(error);
    }

    /// Marks a retryable failure as final.
    pub fn fail_terminally(&mut self) {
        self.state = HunterState::FailedTerminal;
    }

    /// Returns to pending before rescheduling.
    pub fn reset_for_retry(&mut self) {
        self.state = HunterState::Pending;
    }
}

impl fmt::Debug for Hunter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hunter")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("strategy", &self.strategy.name())
            .field("actions", &self.action_count())
            .field("state", &self.state)
            .field("retry_count", &self.retry_count)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// One execution attempt, detached from the registry.
pub struct HuntJob {
    hunter_id: HunterId,
    key: RequestKey,
    request: Request,
    strategy: Arc<dyn LoadStrategy>,
    cancellation: CancellationToken,
    priority: Priority,
    cache: Arc<dyn Cache>,
}

impl HuntJob {
    pub fn hunter_id(&self) -> HunterId {
        self.hunter_id
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Runs the attempt: memory cache first, then the strategy.
    pub async fn run(self) -> HuntOutcome {
        let result = self.hunt().await;
        HuntOutcome {
            hunter_id: self.hunter_id,
            key: self.key,
            result,
        }
    }

    async fn hunt(&self) -> Result<LoadResult, LoadError> {
        if self.cancellation.is_cancelled() {
            return Err(LoadError::Cancelled);
        }

        if self.request.memory_policy().should_read() {
            if let Some(bitmap) = self.cache.get(&self.key) {
                trace!(key = %self.key, "Hunter satisfied from memory cache");
                return Ok(LoadResult::bitmap(bitmap, LoadedFrom::Memory));
            }
        }

        self.strategy.load(&self.request).await
    }
}

impl fmt::Debug for HuntJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HuntJob")
            .field("hunter_id", &self.hunter_id)
            .field("key", &self.key)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Result of one attempt, marshalled back to the coordination context.
#[derive(Debug)]
pub struct HuntOutcome {
    pub hunter_id: HunterId,
    pub key: RequestKey,
    pub result: Result<LoadResult, LoadError>,
}
