//! Helpers shared by the integration tests.

#![allow(dead_code)]

use image::RgbaImage;
use imgload::action::{CallbackTarget, Target};
use imgload::dispatcher::{DispatchSnapshot, DispatcherHandle};
use imgload::error::LoadError;
use imgload::request::Request;
use imgload::result::{Bitmap, LoadResult, LoadedFrom};
use imgload::strategy::{LoadFuture, LoadStrategy};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

// =============================================================================
// Scripted strategy
// =============================================================================

/// Strategy for `test://` URIs whose behaviour is driven by the test.
///
/// The last path segment, when numeric, sets the width of the produced
/// bitmap so tests can tell results apart.
pub struct Scripted {
    gate: Semaphore,
    gated: AtomicBool,
    failing: AtomicBool,
    /// Attempts that fail before loads start succeeding again.
    fail_next: AtomicU32,
    retries: u32,
    started: Mutex<Vec<String>>,
    loads: AtomicUsize,
}

impl Scripted {
    pub fn new() -> Arc<Self> {
        Self::with_retries(0)
    }

    pub fn with_retries(retries: u32) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            retries,
            started: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
        })
    }

    /// Holds every load until [`open`](Self::open) is called.
    pub fn gated() -> Arc<Self> {
        let strategy = Self::new();
        strategy.gated.store(true, Ordering::SeqCst);
        strategy
    }

    pub fn open(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next(&self, attempts: u32) {
        self.fail_next.store(attempts, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// URIs in the order their loads started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }
}

fn width_of(uri: &str) -> u32 {
    uri.rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
        .unwrap_or(1)
}

impl LoadStrategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn can_handle(&self, request: &Request) -> bool {
        request.source().scheme() == Some("test")
    }

    fn load<'a>(&'a self, request: &'a Request) -> LoadFuture<'a> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let uri = request.source().to_string();
        self.started.lock().push(uri.clone());

        Box::pin(async move {
            if self.gated.load(Ordering::SeqCst) {
                match self.gate.acquire().await {
                    Ok(permit) => permit.forget(),
                    Err(_) => return Err(LoadError::Cancelled),
                }
            }

            let forced = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if forced || self.failing.load(Ordering::SeqCst) {
                return Err(LoadError::Network(format!("{uri} unreachable")));
            }

            let width = width_of(&uri);
            Ok(LoadResult::bitmap(
                Bitmap::new(RgbaImage::new(width, 1)),
                LoadedFrom::Network,
            ))
        })
    }

    fn retry_count(&self) -> u32 {
        self.retries
    }

    fn should_retry(&self, is_connected: bool) -> bool {
        is_connected
    }

    fn supports_replay(&self) -> bool {
        true
    }
}

// =============================================================================
// Recording target
// =============================================================================

/// Target that records every outcome it receives.
#[derive(Default)]
pub struct Recorder {
    successes: Mutex<Vec<LoadResult>>,
    errors: Mutex<Vec<LoadError>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A target forwarding to this recorder.
    pub fn target(self: &Arc<Self>) -> Arc<dyn Target> {
        let on_success = Arc::clone(self);
        let on_error = Arc::clone(self);
        CallbackTarget::new(
            move |result| on_success.successes.lock().push(result),
            move |error| on_error.errors.lock().push(error),
        )
    }

    pub fn successes(&self) -> Vec<LoadResult> {
        self.successes.lock().clone()
    }

    pub fn errors(&self) -> Vec<LoadError> {
        self.errors.lock().clone()
    }

    pub fn outcome_count(&self) -> usize {
        self.successes.lock().len() + self.errors.lock().len()
    }
}

// =============================================================================
// Waiting
// =============================================================================

const WAIT_LIMIT: Duration = Duration::from_secs(2);

/// Polls `condition` until it holds, panicking after two seconds.
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    if tokio::time::timeout(WAIT_LIMIT, wait).await.is_err() {
        panic!("timed out waiting for {what}");
    }
}

/// Polls dispatcher snapshots until `condition` holds.
pub async fn snapshot_until(
    what: &str,
    handle: &DispatcherHandle,
    condition: impl Fn(&DispatchSnapshot) -> bool,
) -> DispatchSnapshot {
    let wait = async {
        loop {
            if let Ok(snapshot) = handle.snapshot().await {
                if condition(&snapshot) {
                    return snapshot;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    match tokio::time::timeout(WAIT_LIMIT, wait).await {
        Ok(snapshot) => snapshot,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

/// Gives in-flight work a moment to (not) happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn request(uri: &str) -> Request {
    Request::uri(uri).build().expect("valid request")
}
