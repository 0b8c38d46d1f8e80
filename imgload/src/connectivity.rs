//! Connectivity signal consumed by the dispatcher.
//!
//! The dispatcher only needs to know whether validated internet access is
//! available and, optionally, what kind of link carries it. Platforms push
//! transitions into a [`ConnectivityObserver`]; the dispatcher subscribes to
//! its watch channel.

use std::fmt;
use tokio::sync::watch;

/// Mobile network generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellularGeneration {
    G2,
    G3,
    G4,
    G5,
}

/// Kind of link carrying the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkKind {
    #[default]
    Unknown,
    Wifi,
    Ethernet,
    Cellular(CellularGeneration),
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Wifi => f.write_str("wifi"),
            Self::Ethernet => f.write_str("ethernet"),
            Self::Cellular(generation) => write!(f, "cellular-{:?}", generation),
        }
    }
}

/// Snapshot of connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NetworkState {
    pub connected: bool,
    pub kind: NetworkKind,
}

impl NetworkState {
    pub fn connected(kind: NetworkKind) -> Self {
        Self {
            connected: true,
            kind,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            kind: NetworkKind::Unknown,
        }
    }
}

/// Source of connectivity information.
pub trait ConnectivityMonitor: Send + Sync {
    /// Whether the platform allows observing connectivity at all.
    ///
    /// Without permission, retry decisions assume no connection and failed
    /// requests are never queued for replay.
    fn has_permission(&self) -> bool;

    fn current(&self) -> NetworkState;

    /// Subscribes to state transitions.
    fn subscribe(&self) -> watch::Receiver<NetworkState>;
}

/// Watch-channel backed monitor fed by the embedding application.
///
/// ```
/// use imgload::connectivity::{ConnectivityMonitor, ConnectivityObserver, NetworkKind};
///
/// let observer = ConnectivityObserver::new();
/// observer.set_connected(NetworkKind::Wifi);
/// assert!(observer.current().connected);
/// ```
pub struct ConnectivityObserver {
    tx: watch::Sender<NetworkState>,
    permitted: bool,
}

impl ConnectivityObserver {
    /// Creates an observer that starts out connected over an unknown link.
    pub fn new() -> Self {
        Self::with_state(NetworkState::connected(NetworkKind::Unknown))
    }

    pub fn with_state(state: NetworkState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx, permitted: true }
    }

    /// Creates an observer for a platform that denies connectivity access.
    pub fn without_permission() -> Self {
        let (tx, _rx) = watch::channel(NetworkState::disconnected());
        Self {
            tx,
            permitted: false,
        }
    }

    /// Publishes a new state; subscribers only see actual changes.
    pub fn set_state(&self, state: NetworkState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub fn set_connected(&self, kind: NetworkKind) {
        self.set_state(NetworkState::connected(kind));
    }

    pub fn set_disconnected(&self) {
        self.set_state(NetworkState::disconnected());
    }
}

impl Default for ConnectivityObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor for ConnectivityObserver {
    fn has_permission(&self) -> bool {
        self.permitted
    }

    fn current(&self) -> NetworkState {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.tx.subscribe()
    }
}
