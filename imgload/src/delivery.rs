//! Delivery to callers on the main context.
//!
//! The coordination context never runs caller code. Finished hunters,
//! resumed batches and reclaimed actions are handed to a [`DeliverySink`];
//! the loader's sink forwards them over a channel to a single task, the main
//! context, which invokes target callbacks one at a time.

use crate::action::Action;
use crate::hunter::Hunter;
use crate::result::LoadResult;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Receives work leaving the coordination context.
pub trait DeliverySink: Send + Sync {
    /// A hunter finished: completed, or failed terminally.
    fn complete(&self, hunter: Hunter);

    /// Actions whose tag was resumed; each re-enters submission.
    fn resume(&self, actions: Vec<Arc<Action>>);

    /// Actions dropped because their target was reclaimed.
    fn reclaimed(&self, _actions: Vec<Arc<Action>>) {}
}

/// Messages processed by the main context.
#[derive(Debug)]
pub enum MainMessage {
    Complete(Hunter),
    Resume(Vec<Arc<Action>>),
    Reclaimed(Vec<Arc<Action>>),
    /// A memory cache hit satisfied an action without a hunter.
    CacheHit {
        action: Arc<Action>,
        result: LoadResult,
    },
}

/// Handles main-context messages; implemented by the loader.
pub trait MainHandler: Send + Sync + 'static {
    fn complete(&self, hunter: Hunter);

    fn resume(&self, actions: Vec<Arc<Action>>);

    fn reclaimed(&self, actions: Vec<Arc<Action>>);

    fn cache_hit(&self, action: Arc<Action>, result: LoadResult);
}

/// [`DeliverySink`] that posts to the main context's channel.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MainMessage>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<MainMessage>) -> Self {
        Self { tx }
    }

    fn post(&self, message: MainMessage) {
        if self.tx.send(message).is_err() {
            debug!("Main context gone, dropping delivery");
        }
    }
}

impl DeliverySink for ChannelSink {
    fn complete(&self, hunter: Hunter) {
        self.post(MainMessage::Complete(hunter));
    }

    fn resume(&self, actions: Vec<Arc<Action>>) {
        self.post(MainMessage::Resume(actions));
    }

    fn reclaimed(&self, actions: Vec<Arc<Action>>) {
        self.post(MainMessage::Reclaimed(actions));
    }
}

/// The single task on which every caller callback runs.
pub struct MainContext {
    rx: mpsc::UnboundedReceiver<MainMessage>,
    handler: Arc<dyn MainHandler>,
}

impl MainContext {
    /// Creates the context over an existing channel.
    ///
    /// The sender usually lives in a [`ChannelSink`] handed to the dispatcher
    /// before the handler exists.
    pub fn new(handler: Arc<dyn MainHandler>, rx: mpsc::UnboundedReceiver<MainMessage>) -> Self {
        Self { rx, handler }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Processes messages until shutdown, then drains what is already queued.
    pub async fn run(mut self, shutdown: CancellationToken) {
        debug!("Main context starting");

        loop {
            tokio::select! {
                biased;

                message = self.rx.recv() => {
                    match message {
                        Some(message) => self.handle(message),
                        None => break,
                    }
                }

                _ = shutdown.cancelled() => {
                    let mut drained = 0usize;
                    while let Ok(message) = self.rx.try_recv() {
                        self.handle(message);
                        drained += 1;
                    }
                    info!(drained, "Main context shutting down");
                    break;
                }
            }
        }

        debug!("Main context stopped");
    }

    fn handle(&self, message: MainMessage) {
        match message {
            MainMessage::Complete(hunter) => self.handler.complete(hunter),
            MainMessage::Resume(actions) => self.handler.resume(actions),
            MainMessage::Reclaimed(actions) => self.handler.reclaimed(actions),
            MainMessage::CacheHit { action, result } => self.handler.cache_hit(action, result),
        }
    }
}
