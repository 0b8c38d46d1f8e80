//! Request coordination.
//!
//! The dispatcher owns every hunter, the paused tag set, and the two action
//! buffers (paused, awaiting replay). All of it is mutated from one task, so
//! no registry locking exists; callers talk to it through
//! [`DispatcherHandle`], workers report back with [`HuntOutcome`]s.
//!
//! # Architecture
//!
//! ```text
//!  ImageLoader ──DispatchMessage──►┐
//!  WorkerPool  ──HuntOutcome──────►├─► Dispatcher ──► DispatchState
//!  Connectivity ──watch───────────►│                      │
//!  reaper tick ───────────────────►┘                      ├─► HuntExecutor (WorkerPool)
//!                                                         └─► DeliverySink (main context)
//! ```
//!
//! - `DispatchState`: coalescing, pause/resume, retry and replay decisions
//! - `WorkerPool`: bounded, priority-ordered execution of hunt attempts
//! - `Dispatcher`: the actor loop feeding the state one event at a time
//!
//! [`HuntOutcome`]: crate::hunter::HuntOutcome

mod actor;
mod config;
mod message;
mod pool;
mod state;
mod stats;

pub use actor::{Dispatcher, DispatcherHandle};
pub use config::{DispatcherConfig, DEFAULT_POOL_SIZE, DEFAULT_REAP_INTERVAL};
pub use message::DispatchMessage;
pub use pool::{pool_size_for, HuntExecutor, WorkerPool};
pub use state::{DispatchParts, DispatchState};
pub use stats::{DispatchSnapshot, DispatchStats};
