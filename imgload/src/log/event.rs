//! Request lifecycle events.
//!
//! Lines are column-aligned so a request can be followed by grepping its
//! log id:
//!
//! ```text
//! Main        created     [R12]        Request{https://example.com/a.png}
//! Dispatcher  enqueued    [R12]
//! Hunter      executing   [R12]
//! Dispatcher  delivered   [R12]
//! ```

use crate::log::Logger;
use std::fmt;

/// Context that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOwner {
    Main,
    Dispatcher,
    Hunter,
}

impl LogOwner {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "Main",
            Self::Dispatcher => "Dispatcher",
            Self::Hunter => "Hunter",
        }
    }
}

impl fmt::Display for LogOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What happened to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogVerb {
    Created,
    Changed,
    Decoded,
    Executing,
    Completed,
    Errored,
    Paused,
    Resumed,
    Retrying,
    Replaying,
    Ignored,
    Canceled,
    Enqueued,
    Delivered,
    Joined,
    Removed,
    Reclaimed,
}

impl LogVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Changed => "changed",
            Self::Decoded => "decoded",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Paused => "paused",
            Self::Resumed => "resumed",
            Self::Retrying => "retrying",
            Self::Replaying => "replaying",
            Self::Ignored => "ignored",
            Self::Canceled => "canceled",
            Self::Enqueued => "enqueued",
            Self::Delivered => "delivered",
            Self::Joined => "joined",
            Self::Removed => "removed",
            Self::Reclaimed => "reclaimed",
        }
    }
}

impl fmt::Display for LogVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Formats one event line.
pub fn format_event(owner: LogOwner, verb: LogVerb, log_id: &str, extras: &str) -> String {
    let line = format!("{:<12}{:<12}{:<13}{}", owner, verb, log_id, extras);
    line.trim_end().to_string()
}

/// Emits one event line at debug level.
pub fn log_event(logger: &dyn Logger, owner: LogOwner, verb: LogVerb, log_id: &str, extras: &str) {
    logger.debug(format_args!("{}", format_event(owner, verb, log_id, extras)));
}
