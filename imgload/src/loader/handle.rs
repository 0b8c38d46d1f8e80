//! Awaitable handle for a single load.

use super::inner::LoaderCore;
use crate::action::{Action, ActionId};
use crate::error::LoadError;
use crate::result::LoadResult;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

type Outcome = Result<LoadResult, LoadError>;

/// Resolves to the outcome of one [`ImageLoader::load`] call.
///
/// The handle owns the load's target: dropping it without awaiting lets the
/// dispatcher reclaim the request on its next sweep. [`cancel`](Self::cancel)
/// withdraws it immediately.
///
/// Resolves to [`LoadError::Shutdown`] if the loader is dropped first.
///
/// [`ImageLoader::load`]: super::ImageLoader::load
pub struct LoadHandle {
    outcome: Pin<Box<dyn Future<Output = Outcome> + Send>>,
    action: Arc<Action>,
    core: Arc<LoaderCore>,
}

impl LoadHandle {
    pub(crate) fn new(
        outcome: Pin<Box<dyn Future<Output = Outcome> + Send>>,
        action: Arc<Action>,
        core: Arc<LoaderCore>,
    ) -> Self {
        Self {
            outcome,
            action,
            core,
        }
    }

    pub fn action_id(&self) -> ActionId {
        self.action.id()
    }

    /// Log id of the underlying request.
    pub fn log_id(&self) -> String {
        self.action.log_id()
    }

    /// Withdraws the load; nothing will be delivered for it.
    pub fn cancel(self) {
        self.core.cancel_tracked(&self.action);
    }
}

impl Future for LoadHandle {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().outcome.as_mut().poll(cx)
    }
}

impl fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandle")
            .field("action", &self.action.id())
            .field("key", self.action.key())
            .finish()
    }
}
