//! Delivery targets.
//!
//! A target is the caller-visible end of a load. Actions refer to caller
//! targets weakly so that a pending, paused, or failed action never keeps a
//! target alive on its own.

use crate::error::LoadError;
use crate::result::LoadResult;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;

/// Receives the terminal outcome of a load.
///
/// Both methods run on the loader's delivery context, one call at a time.
pub trait Target: Send + Sync + 'static {
    fn on_success(&self, result: LoadResult);

    fn on_error(&self, error: LoadError);
}

/// Identity of a target allocation.
///
/// Derived from the address of the target's shared allocation. Every action
/// holds at least a weak reference to its target, which keeps the allocation
/// (not the value) reserved, so an identity cannot be reused while any action
/// still refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    pub fn of(target: &Arc<dyn Target>) -> Self {
        Self(Arc::as_ptr(target) as *const () as usize)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{:x}", self.0)
    }
}

/// How an action holds its target.
#[derive(Clone)]
pub enum TargetHandle {
    /// Caller-owned target; the action must not extend its lifetime.
    Weak(Weak<dyn Target>),
    /// Target owned by the action itself (fetch requests).
    Owned(Arc<dyn Target>),
}

impl TargetHandle {
    pub fn weak(target: &Arc<dyn Target>) -> Self {
        Self::Weak(Arc::downgrade(target))
    }

    pub fn owned(target: Arc<dyn Target>) -> Self {
        Self::Owned(target)
    }

    pub fn upgrade(&self) -> Option<Arc<dyn Target>> {
        match self {
            Self::Weak(weak) => weak.upgrade(),
            Self::Owned(target) => Some(Arc::clone(target)),
        }
    }

    /// Whether the target can still receive an outcome.
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Weak(weak) => weak.strong_count() > 0,
            Self::Owned(_) => true,
        }
    }
}

impl fmt::Debug for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weak(_) => write!(f, "TargetHandle::Weak(alive={})", self.is_alive()),
            Self::Owned(_) => f.write_str("TargetHandle::Owned"),
        }
    }
}

type SuccessFn = Box<dyn Fn(LoadResult) + Send + Sync>;
type ErrorFn = Box<dyn Fn(LoadError) + Send + Sync>;

/// Target backed by a pair of closures.
///
/// ```
/// use imgload::action::CallbackTarget;
///
/// let target = CallbackTarget::new(
///     |result| println!("loaded from {}", result.loaded_from()),
///     |error| eprintln!("failed: {error}"),
/// );
/// # drop(target);
/// ```
pub struct CallbackTarget {
    on_success: SuccessFn,
    on_error: ErrorFn,
}

impl CallbackTarget {
    pub fn new(
        on_success: impl Fn(LoadResult) + Send + Sync + 'static,
        on_error: impl Fn(LoadError) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        })
    }
}

impl Target for CallbackTarget {
    fn on_success(&self, result: LoadResult) {
        (self.on_success)(result);
    }

    fn on_error(&self, error: LoadError) {
        (self.on_error)(error);
    }
}

/// Target that forwards the first outcome into a oneshot channel.
///
/// Backs [`LoadHandle`](crate::loader::LoadHandle).
pub(crate) struct ChannelTarget {
    tx: Mutex<Option<oneshot::Sender<Result<LoadResult, LoadError>>>>,
}

impl ChannelTarget {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<Result<LoadResult, LoadError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Arc::new(Self {
                tx: Mutex::new(Some(tx)),
            }),
            rx,
        )
    }

    fn send(&self, outcome: Result<LoadResult, LoadError>) {
        if let Some(tx) = self.tx.lock().take() {
            // Receiver gone means the handle was dropped
            let _ = tx.send(outcome);
        }
    }
}

impl Target for ChannelTarget {
    fn on_success(&self, result: LoadResult) {
        self.send(Ok(result));
    }

    fn on_error(&self, error: LoadError) {
        self.send(Err(error));
    }
}

type CompletionFn = Box<dyn Fn(Result<(), LoadError>) + Send + Sync>;

/// Target of a fetch request; owned by its action.
pub(crate) struct FetchTarget {
    completion: Option<CompletionFn>,
}

impl FetchTarget {
    pub(crate) fn new(completion: Option<CompletionFn>) -> Arc<Self> {
        Arc::new(Self { completion })
    }
}

impl Target for FetchTarget {
    fn on_success(&self, _result: LoadResult) {
        if let Some(completion) = &self.completion {
            completion(Ok(()));
        }
    }

    fn on_error(&self, error: LoadError) {
        if let Some(completion) = &self.completion {
            completion(Err(error));
        }
    }
}
