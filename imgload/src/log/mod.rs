//! Request event logging.
//!
//! The dispatcher and loader report each request's lifecycle through a
//! [`Logger`] rather than calling `tracing` directly, so a loader built with
//! logging disabled pays nothing for it.
//!
//! # Architecture
//!
//! - `Logger` trait: The interface components log through
//! - `TracingLogger`: Delegates to the `tracing` crate
//! - `NoOpLogger`: Discards everything; used when logging is disabled
//! - [`log_event`]: Formats one `owner verb log-id extras` line
//!
//! # Usage
//!
//! ```
//! use imgload::log::{log_event, LogOwner, LogVerb, Logger, NoOpLogger};
//! use std::sync::Arc;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_event(&*logger, LogOwner::Dispatcher, LogVerb::Enqueued, "[R1]", "");
//! ```

mod event;
mod noop;
mod tracing_adapter;
mod r#trait;

pub use event::{format_event, log_event, LogOwner, LogVerb};
pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
