//! Caller-facing loader.
//!
//! [`ImageLoader`] owns one dispatcher, one memory cache, and one main
//! context. Loaders are independent of each other; nothing is global.
//!
//! # Delivering results
//!
//! Three ways to receive an outcome:
//!
//! - [`ImageLoader::load_into`]: a caller-owned [`Target`], held weakly
//! - [`ImageLoader::load`]: a [`LoadHandle`] future
//! - [`ImageLoader::fetch`]: warm the cache, optionally with a completion
//!
//! Every callback runs on the main context, one at a time. A target has at
//! most one live request; loading into a target that is still waiting
//! cancels the earlier request.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use imgload::loader::ImageLoader;
//! use imgload::request::Request;
//!
//! let loader = ImageLoader::builder().start()?;
//! let request = Request::uri("https://example.com/a.png").resize(64, 64).build()?;
//! let result = loader.load(request)?.await?;
//! println!("loaded from {}", result.loaded_from());
//! loader.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! [`Target`]: crate::action::Target

mod builder;
mod inner;
mod handle;

pub use builder::ImageLoaderBuilder;
pub use inner::FailureListener;
pub use handle::LoadHandle;

use crate::action::{Action, ChannelTarget, FetchTarget, Tag, Target, TargetId};
use crate::cache::CacheStats;
use crate::connectivity::NetworkState;
use crate::dispatcher::DispatchSnapshot;
use crate::error::{LoadError, LoaderError};
use crate::request::Request;
use inner::LoaderCore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Loads, transforms, caches and delivers images.
pub struct ImageLoader {
    core: Arc<LoaderCore>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ImageLoader {
    pub fn builder() -> ImageLoaderBuilder {
        ImageLoaderBuilder::new()
    }

    pub(crate) fn from_parts(
        core: Arc<LoaderCore>,
        shutdown: CancellationToken,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            core,
            shutdown,
            tasks: Mutex::new(tasks),
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads into a caller-owned target.
    ///
    /// The loader keeps only a weak reference; dropping the target abandons
    /// the request.
    pub fn load_into(&self, request: Request, target: &Arc<dyn Target>) -> Result<(), LoaderError> {
        self.core.enqueue(Action::new(request, target))
    }

    /// Loads and returns a handle resolving to the outcome.
    pub fn load(&self, request: Request) -> Result<LoadHandle, LoaderError> {
        let (target, rx) = ChannelTarget::new();
        let target: Arc<dyn Target> = target;
        let action = Action::new(request, &target);
        self.core.enqueue(Arc::clone(&action))?;

        let shutdown = self.shutdown.clone();
        let outcome = Box::pin(async move {
            // The handle owns the target
            let _target = target;
            tokio::select! {
                biased;
                outcome = rx => outcome.unwrap_or(Err(LoadError::Cancelled)),
                _ = shutdown.cancelled() => Err(LoadError::Shutdown),
            }
        });

        Ok(LoadHandle::new(outcome, action, Arc::clone(&self.core)))
    }

    /// Loads into the memory cache only.
    ///
    /// `completion`, if given, runs on the main context once the fetch
    /// finishes.
    pub fn fetch(
        &self,
        request: Request,
        completion: Option<Box<dyn Fn(Result<(), LoadError>) + Send + Sync>>,
    ) -> Result<(), LoaderError> {
        let target: Arc<dyn Target> = FetchTarget::new(completion);
        self.core.enqueue(Action::owning(request, target))
    }

    // =========================================================================
    // Cancellation, pause and resume
    // =========================================================================

    /// Cancels the request currently bound to `target`, if any.
    pub fn cancel_target(&self, target: &Arc<dyn Target>) -> bool {
        self.core.cancel_target(TargetId::of(target))
    }

    /// Cancels every tracked request carrying `tag`; returns how many.
    pub fn cancel_tag(&self, tag: impl Into<Tag>) -> usize {
        self.core.cancel_tag(&tag.into())
    }

    /// Holds back every request with `tag`, including ones in flight.
    pub fn pause_tag(&self, tag: impl Into<Tag>) -> Result<(), LoaderError> {
        self.core.dispatcher().pause_tag(tag.into())
    }

    /// Releases requests held by [`pause_tag`](Self::pause_tag).
    pub fn resume_tag(&self, tag: impl Into<Tag>) -> Result<(), LoaderError> {
        self.core.dispatcher().resume_tag(tag.into())
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Drops every cached result derived from `uri`; returns how many.
    pub fn invalidate(&self, uri: &str) -> usize {
        self.core.cache().clear_source(uri)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.core.cache().stats()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reports a connectivity transition without a monitor.
    pub fn network_state_changed(&self, state: NetworkState) -> Result<(), LoaderError> {
        self.core.dispatcher().network_state_changed(state)
    }

    pub async fn snapshot(&self) -> Result<DispatchSnapshot, LoaderError> {
        self.core.dispatcher().snapshot().await
    }

    /// Requests tracked for delivery, including paused ones.
    pub fn pending_count(&self) -> usize {
        self.core.tracked_count()
    }

    pub fn is_shutdown(&self) -> bool {
        self.core.is_shut_down()
    }

    /// Stops accepting requests and clears the memory cache.
    ///
    /// Loads already running still deliver. Calling this again does nothing.
    pub fn shutdown(&self) {
        if !self.core.mark_shut_down() {
            return;
        }

        let stats = self.core.cache().stats();
        self.core.cache().clear();
        if let Err(e) = self.core.dispatcher().shutdown() {
            debug!(error = %e, "Dispatcher already stopped");
        }

        info!(
            cache_hits = stats.hits,
            cache_misses = stats.misses,
            cache_evictions = stats.evictions,
            "Image loader shut down"
        );
    }

    /// Shuts down and waits for the dispatcher and main context to stop.
    ///
    /// Messages already queued for the main context are delivered first.
    pub async fn close(self) {
        self.shutdown();
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "Loader task ended abnormally");
            }
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("pending", &self.pending_count())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
