//! Tracing library adapter implementation.

use crate::log::{LogLevel, Logger};
use std::fmt::Arguments;

/// Logger that forwards to the `tracing` crate.
///
/// Lines end up wherever the installed subscriber sends them; see
/// [`crate::logging::init_logging`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "imgload::events", "{}", args),
            LogLevel::Debug => tracing::debug!(target: "imgload::events", "{}", args),
            LogLevel::Info => tracing::info!(target: "imgload::events", "{}", args),
            LogLevel::Warn => tracing::warn!(target: "imgload::events", "{}", args),
            LogLevel::Error => tracing::error!(target: "imgload::events", "{}", args),
        }
    }
}
