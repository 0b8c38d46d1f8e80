//! Loader state shared between the caller API and the main context.

use crate::action::{Action, Tag, TargetId};
use crate::cache::Cache;
use crate::delivery::{MainHandler, MainMessage};
use crate::dispatcher::DispatcherHandle;
use crate::error::{LoadError, LoaderError};
use crate::hunter::Hunter;
use crate::log::{log_event, LogOwner, LogVerb, Logger};
use crate::request::Request;
use crate::result::{LoadResult, LoadedFrom};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Invoked once per terminally failed hunter, after delivery.
pub type FailureListener = Arc<dyn Fn(&Request, &LoadError) + Send + Sync>;

/// Target → action tracking plus the collaborators needed to enqueue and
/// deliver.
pub(crate) struct LoaderCore {
    targets: Mutex<HashMap<TargetId, Arc<Action>>>,
    dispatcher: DispatcherHandle,
    main_tx: mpsc::UnboundedSender<MainMessage>,
    cache: Arc<dyn Cache>,
    logger: Arc<dyn Logger>,
    failure_listener: Option<FailureListener>,
    shut_down: AtomicBool,
}

impl LoaderCore {
    pub(crate) fn new(
        dispatcher: DispatcherHandle,
        main_tx: mpsc::UnboundedSender<MainMessage>,
        cache: Arc<dyn Cache>,
        logger: Arc<dyn Logger>,
        failure_listener: Option<FailureListener>,
    ) -> Self {
        Self {
            targets: Mutex::new(HashMap::new()),
            dispatcher,
            main_tx,
            cache,
            logger,
            failure_listener,
            shut_down: AtomicBool::new(false),
        }
    }

    pub(crate) fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }

    pub(crate) fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Marks the loader shut down; returns `false` if it already was.
    pub(crate) fn mark_shut_down(&self) -> bool {
        !self.shut_down.swap(true, Ordering::SeqCst)
    }

    // =========================================================================
    // Caller side
    // =========================================================================

    /// Routes a new action: memory cache hit, or the dispatcher.
    ///
    /// A different action already tracked for the same target is cancelled
    /// first.
    pub(crate) fn enqueue(&self, action: Arc<Action>) -> Result<(), LoaderError> {
        if self.is_shut_down() {
            return Err(LoaderError::Shutdown);
        }

        log_event(
            &*self.logger,
            LogOwner::Main,
            LogVerb::Created,
            &action.log_id(),
            action.key().as_str(),
        );

        self.replace_tracked(&action);

        if let Some(result) = self.quick_memory_check(&action) {
            self.main_tx
                .send(MainMessage::CacheHit { action, result })
                .map_err(|_| LoaderError::Shutdown)?;
            return Ok(());
        }

        self.targets
            .lock()
            .insert(action.target_id(), Arc::clone(&action));
        self.dispatcher.submit(action)
    }

    fn replace_tracked(&self, action: &Arc<Action>) {
        let previous = {
            let mut targets = self.targets.lock();
            match targets.get(&action.target_id()) {
                Some(existing) if existing.id() != action.id() => {
                    targets.remove(&action.target_id())
                }
                _ => None,
            }
        };
        if let Some(previous) = previous {
            self.cancel_action(previous);
        }
    }

    fn quick_memory_check(&self, action: &Action) -> Option<LoadResult> {
        if !action.request().memory_policy().should_read() {
            return None;
        }
        let bitmap = self.cache.get(action.key())?;
        Some(LoadResult::bitmap(bitmap, LoadedFrom::Memory))
    }

    /// Cancels the action currently tracked for a target.
    pub(crate) fn cancel_target(&self, target_id: TargetId) -> bool {
        let removed = self.targets.lock().remove(&target_id);
        match removed {
            Some(action) => {
                self.cancel_action(action);
                true
            }
            None => false,
        }
    }

    /// Cancels one specific action, untracking it if still current.
    pub(crate) fn cancel_tracked(&self, action: &Arc<Action>) {
        {
            let mut targets = self.targets.lock();
            let current = targets
                .get(&action.target_id())
                .is_some_and(|tracked| tracked.id() == action.id());
            if current {
                targets.remove(&action.target_id());
            }
        }
        self.cancel_action(Arc::clone(action));
    }

    /// Cancels every tracked action with `tag`; returns how many.
    pub(crate) fn cancel_tag(&self, tag: &Tag) -> usize {
        let matching: Vec<Arc<Action>> = {
            let mut targets = self.targets.lock();
            let ids: Vec<TargetId> = targets
                .iter()
                .filter(|(_, action)| action.tag() == tag)
                .map(|(target_id, _)| *target_id)
                .collect();
            ids.iter().filter_map(|id| targets.remove(id)).collect()
        };

        let count = matching.len();
        for action in matching {
            self.cancel_action(action);
        }
        count
    }

    fn cancel_action(&self, action: Arc<Action>) {
        action.cancel();
        log_event(
            &*self.logger,
            LogOwner::Main,
            LogVerb::Canceled,
            &action.log_id(),
            "",
        );
        if let Err(e) = self.dispatcher.cancel(action) {
            debug!(error = %e, "Dispatcher gone, cancel not forwarded");
        }
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.targets.lock().len()
    }

    // =========================================================================
    // Main-context side
    // =========================================================================

    fn deliver(&self, action: &Arc<Action>, outcome: Result<&LoadResult, &LoadError>) {
        if action.is_cancelled() {
            return;
        }

        if !action.will_replay() {
            let mut targets = self.targets.lock();
            let current = targets
                .get(&action.target_id())
                .is_some_and(|tracked| tracked.id() == action.id());
            if current {
                targets.remove(&action.target_id());
            }
        }

        match outcome {
            Ok(result) => {
                log_event(
                    &*self.logger,
                    LogOwner::Main,
                    LogVerb::Completed,
                    &action.log_id(),
                    &format!("from {}", result.loaded_from()),
                );
                action.complete(result.clone());
            }
            Err(error) => {
                log_event(
                    &*self.logger,
                    LogOwner::Main,
                    LogVerb::Errored,
                    &action.log_id(),
                    &error.to_string(),
                );
                action.error(error.clone());
            }
        }
    }
}

impl MainHandler for LoaderCore {
    fn complete(&self, hunter: Hunter) {
        let outcome = match (hunter.result(), hunter.error()) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(error),
            (None, None) => {
                warn!(hunter = %hunter.id(), key = %hunter.key(), "Hunter finished without an outcome");
                return;
            }
        };

        for action in hunter.actions() {
            self.deliver(action, outcome);
        }

        if let (Err(error), Some(listener)) = (outcome, &self.failure_listener) {
            listener(hunter.request(), error);
        }
    }

    fn resume(&self, actions: Vec<Arc<Action>>) {
        for action in actions {
            if action.is_cancelled() {
                continue;
            }

            if let Some(result) = self.quick_memory_check(&action) {
                self.deliver(&action, Ok(&result));
                continue;
            }

            if let Err(e) = self.dispatcher.submit(action) {
                debug!(error = %e, "Dispatcher gone, resumed action dropped");
            }
        }
    }

    fn reclaimed(&self, actions: Vec<Arc<Action>>) {
        let mut targets = self.targets.lock();
        for action in actions {
            let current = targets
                .get(&action.target_id())
                .is_some_and(|tracked| tracked.id() == action.id());
            if current {
                targets.remove(&action.target_id());
            }
        }
    }

    fn cache_hit(&self, action: Arc<Action>, result: LoadResult) {
        self.deliver(&action, Ok(&result));
    }
}
