//! Messages accepted by the dispatcher actor.

use super::stats::DispatchSnapshot;
use crate::action::{Action, Tag};
use crate::connectivity::NetworkState;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Requests posted to the coordination context.
///
/// Messages from one sender are processed in the order they were sent.
pub enum DispatchMessage {
    Submit(Arc<Action>),
    Cancel(Arc<Action>),
    PauseTag(Tag),
    ResumeTag(Tag),
    NetworkStateChange(NetworkState),
    /// Stop accepting new hunters and unregister from connectivity.
    Shutdown,
    /// Reply with a copy of the registry counters.
    Snapshot(oneshot::Sender<DispatchSnapshot>),
}

impl fmt::Debug for DispatchMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit(action) => write!(f, "Submit({})", action.id()),
            Self::Cancel(action) => write!(f, "Cancel({})", action.id()),
            Self::PauseTag(tag) => write!(f, "PauseTag({})", tag),
            Self::ResumeTag(tag) => write!(f, "ResumeTag({})", tag),
            Self::NetworkStateChange(state) => write!(f, "NetworkStateChange({:?})", state),
            Self::Shutdown => f.write_str("Shutdown"),
            Self::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}
