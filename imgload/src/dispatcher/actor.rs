//! The dispatcher actor and its handle.
//!
//! [`Dispatcher`] is a single task that owns [`DispatchState`] and processes,
//! one at a time: caller messages, worker outcomes, connectivity transitions
//! and the periodic reaper tick. [`DispatcherHandle`] is the cloneable
//! front door that posts messages to it.

use super::config::DispatcherConfig;
use super::message::DispatchMessage;
use super::pool::{HuntExecutor, WorkerPool};
use super::state::{DispatchParts, DispatchState};
use super::stats::DispatchSnapshot;
use crate::action::{Action, Tag};
use crate::cache::Cache;
use crate::connectivity::{ConnectivityMonitor, NetworkState};
use crate::delivery::DeliverySink;
use crate::error::LoaderError;
use crate::hunter::HuntOutcome;
use crate::log::Logger;
use crate::strategy::StrategyRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Serial coordination context for all hunters.
pub struct Dispatcher {
    state: DispatchState,
    rx: mpsc::UnboundedReceiver<DispatchMessage>,
    outcome_rx: mpsc::UnboundedReceiver<HuntOutcome>,
    network_rx: Option<watch::Receiver<NetworkState>>,
    reap_interval: Duration,
}

impl Dispatcher {
    /// Creates the dispatcher, its worker pool, and a handle to it.
    ///
    /// The dispatcher does nothing until [`run`](Self::run) is awaited or
    /// [`spawn`](Self::spawn)ed.
    pub fn new(
        config: DispatcherConfig,
        strategies: StrategyRegistry,
        cache: Arc<dyn Cache>,
        sink: Arc<dyn DeliverySink>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        logger: Arc<dyn Logger>,
    ) -> (Self, DispatcherHandle) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let pool: Arc<dyn HuntExecutor> = Arc::new(WorkerPool::new(config.pool_size, outcome_tx));
        Self::with_executor(config, strategies, cache, pool, outcome_rx, sink, connectivity, logger)
    }

    /// Creates a dispatcher around a caller-supplied executor.
    ///
    /// The executor must report outcomes on the sender paired with
    /// `outcome_rx`.
    #[allow(clippy::too_many_arguments)]
    pub fn with_executor(
        config: DispatcherConfig,
        strategies: StrategyRegistry,
        cache: Arc<dyn Cache>,
        executor: Arc<dyn HuntExecutor>,
        outcome_rx: mpsc::UnboundedReceiver<HuntOutcome>,
        sink: Arc<dyn DeliverySink>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        logger: Arc<dyn Logger>,
    ) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let state = DispatchState::new(
            &config,
            DispatchParts {
                strategies,
                cache,
                executor,
                sink,
                connectivity: Arc::clone(&connectivity),
                logger,
            },
        );

        let network_rx = state
            .scans_network_changes()
            .then(|| connectivity.subscribe());

        let dispatcher = Self {
            state,
            rx,
            outcome_rx,
            network_rx,
            reap_interval: config.reap_interval,
        };

        (dispatcher, DispatcherHandle { tx })
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Processes work until cancelled or every handle is dropped.
    ///
    /// A [`DispatchMessage::Shutdown`] does not stop the loop: attempts
    /// already running still deliver their outcomes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            reap_interval_ms = self.reap_interval.as_millis() as u64,
            scans_network_changes = self.network_rx.is_some(),
            "Dispatcher starting"
        );

        let mut reaper = tokio::time::interval(self.reap_interval);
        reaper.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick
        reaper.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Dispatcher cancelled");
                    break;
                }

                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.handle(message),
                        None => {
                            debug!("All dispatcher handles dropped");
                            break;
                        }
                    }
                }

                Some(outcome) = self.outcome_rx.recv() => {
                    self.state.perform_hunt_finished(outcome);
                }

                change = next_network_state(&mut self.network_rx) => {
                    match change {
                        Some(state) => self.state.perform_network_state_change(state),
                        None => {
                            debug!("Connectivity source closed, no longer observing");
                            self.network_rx = None;
                        }
                    }
                }

                _ = reaper.tick() => {
                    self.state.reap();
                }
            }
        }

        self.state.perform_shutdown();
        let stats = self.state.stats();
        info!(
            submitted = stats.submitted,
            coalesced = stats.coalesced,
            hunters = stats.hunters_created,
            completed = stats.completed,
            failed = stats.failed,
            replayed = stats.replayed,
            "Dispatcher stopped"
        );
    }

    fn handle(&mut self, message: DispatchMessage) {
        match message {
            DispatchMessage::Submit(action) => self.state.perform_submit(action, true),
            DispatchMessage::Cancel(action) => self.state.perform_cancel(&action),
            DispatchMessage::PauseTag(tag) => self.state.perform_pause_tag(tag),
            DispatchMessage::ResumeTag(tag) => self.state.perform_resume_tag(tag),
            DispatchMessage::NetworkStateChange(state) => {
                self.state.perform_network_state_change(state)
            }
            DispatchMessage::Shutdown => {
                self.state.perform_shutdown();
                // Unregister from connectivity
                self.network_rx = None;
            }
            DispatchMessage::Snapshot(reply) => {
                // Requester may have given up waiting
                let _ = reply.send(self.state.snapshot());
            }
        }
    }
}

/// Waits for the next connectivity transition.
///
/// Pends forever when not observing; yields `None` once the source is gone.
async fn next_network_state(
    rx: &mut Option<watch::Receiver<NetworkState>>,
) -> Option<NetworkState> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}

/// Cloneable sender side of a [`Dispatcher`].
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<DispatchMessage>,
}

impl DispatcherHandle {
    fn send(&self, message: DispatchMessage) -> Result<(), LoaderError> {
        self.tx.send(message).map_err(|_| LoaderError::Shutdown)
    }

    pub fn submit(&self, action: Arc<Action>) -> Result<(), LoaderError> {
        self.send(DispatchMessage::Submit(action))
    }

    pub fn cancel(&self, action: Arc<Action>) -> Result<(), LoaderError> {
        self.send(DispatchMessage::Cancel(action))
    }

    pub fn pause_tag(&self, tag: Tag) -> Result<(), LoaderError> {
        self.send(DispatchMessage::PauseTag(tag))
    }

    pub fn resume_tag(&self, tag: Tag) -> Result<(), LoaderError> {
        self.send(DispatchMessage::ResumeTag(tag))
    }

    /// Reports a connectivity transition directly, without a monitor.
    pub fn network_state_changed(&self, state: NetworkState) -> Result<(), LoaderError> {
        self.send(DispatchMessage::NetworkStateChange(state))
    }

    pub fn shutdown(&self) -> Result<(), LoaderError> {
        self.send(DispatchMessage::Shutdown)
    }

    /// Whether the dispatcher task has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn snapshot(&self) -> Result<DispatchSnapshot, LoaderError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(DispatchMessage::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| LoaderError::Shutdown)
    }
}
