//! Actions: one caller's interest in the outcome of a request.
//!
//! An [`Action`] binds a [`Request`] to a delivery target and a [`Tag`].
//! Actions are shared as `Arc<Action>` between the loader, the dispatcher's
//! registries and at most one hunter at a time; their `cancelled` and
//! `will_replay` flags are the only mutable state.

mod target;

pub use target::{CallbackTarget, Target, TargetHandle, TargetId};
pub(crate) use target::{ChannelTarget, FetchTarget};

use crate::error::LoadError;
use crate::request::{Request, RequestKey};
use crate::result::LoadResult;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique action identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Grouping identity for pause and resume.
///
/// Requests without a caller-supplied tag are tagged with their own action,
/// so they can only be paused individually.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Named(Arc<str>),
    Action(ActionId),
}

impl Tag {
    pub fn named(tag: impl AsRef<str>) -> Self {
        Self::Named(Arc::from(tag.as_ref()))
    }
}

impl From<&str> for Tag {
    fn from(tag: &str) -> Self {
        Self::named(tag)
    }
}

impl From<String> for Tag {
    fn from(tag: String) -> Self {
        Self::named(tag)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Action(id) => write!(f, "{}", id),
        }
    }
}

/// A caller's request bound to its delivery target.
pub struct Action {
    id: ActionId,
    request: Request,
    tag: Tag,
    target_id: TargetId,
    target: TargetHandle,
    cancelled: AtomicBool,
    will_replay: AtomicBool,
}

impl Action {
    /// Creates an action that refers to a caller-owned target weakly.
    pub fn new(request: Request, target: &Arc<dyn Target>) -> Arc<Self> {
        Self::with_handle(request, TargetId::of(target), TargetHandle::weak(target))
    }

    /// Creates an action that owns its target.
    pub fn owning(request: Request, target: Arc<dyn Target>) -> Arc<Self> {
        let target_id = TargetId::of(&target);
        Self::with_handle(request, target_id, TargetHandle::owned(target))
    }

    fn with_handle(request: Request, target_id: TargetId, target: TargetHandle) -> Arc<Self> {
        let id = ActionId::next();
        let tag = match request.tag() {
            Some(name) => Tag::named(name),
            None => Tag::Action(id),
        };
        Arc::new(Self {
            id,
            request,
            tag,
            target_id,
            target,
            cancelled: AtomicBool::new(false),
            will_replay: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn key(&self) -> &RequestKey {
        self.request.key()
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn target_id(&self) -> TargetId {
        self.target_id
    }

    pub fn target(&self) -> &TargetHandle {
        &self.target
    }

    /// Whether the target can still receive an outcome.
    pub fn is_target_alive(&self) -> bool {
        self.target.is_alive()
    }

    pub fn log_id(&self) -> String {
        self.request.log_id()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn will_replay(&self) -> bool {
        self.will_replay.load(Ordering::SeqCst)
    }

    pub(crate) fn set_will_replay(&self, replay: bool) {
        self.will_replay.store(replay, Ordering::SeqCst);
    }

    /// Hands a result to the target, if it is still alive.
    pub(crate) fn complete(&self, result: LoadResult) {
        if let Some(target) = self.target.upgrade() {
            target.on_success(result);
        }
    }

    /// Hands a failure to the target, if it is still alive.
    pub(crate) fn error(&self, error: LoadError) {
        if let Some(target) = self.target.upgrade() {
            target.on_error(error);
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("key", self.key())
            .field("tag", &self.tag)
            .field("target_id", &self.target_id)
            .field("cancelled", &self.is_cancelled())
            .field("will_replay", &self.will_replay())
            .finish()
    }
}
