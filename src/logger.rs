//! Logging collaborator.
//!
//! The runtime reports what it does through a [`Logger`]. Logging is purely
//! observational: sinks never influence state. The default sink,
//! [`TracingLogger`], forwards every record to `tracing`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Severity of a log record, from most to least verbose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Sink for log records produced by stores and state machines.
///
/// `tag` identifies the component, e.g. `"downloads -> in_state[1]"`.
pub trait Logger: Send + Sync {
    fn log(&self, tag: &str, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>);
}

/// Forwards records to `tracing`, mapping `Verbose` to `trace`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(
        &self,
        tag: &str,
        level: LogLevel,
        message: &str,
        cause: Option<&(dyn Error + 'static)>,
    ) {
        match (level, cause) {
            (LogLevel::Verbose, _) => tracing::trace!(tag, "{}", message),
            (LogLevel::Debug, _) => tracing::debug!(tag, "{}", message),
            (LogLevel::Info, _) => tracing::info!(tag, "{}", message),
            (LogLevel::Warn, Some(cause)) => tracing::warn!(tag, error = %cause, "{}", message),
            (LogLevel::Warn, None) => tracing::warn!(tag, "{}", message),
            (LogLevel::Error, Some(cause)) => tracing::error!(tag, error = %cause, "{}", message),
            (LogLevel::Error, None) => tracing::error!(tag, "{}", message),
        }
    }
}

/// Logger bound to a tag and a minimum level.
///
/// Messages are built lazily, so filtered records cost nothing.
#[derive(Clone)]
pub(crate) struct TaggedLogger {
    sink: Arc<dyn Logger>,
    tag: Arc<str>,
    min_level: LogLevel,
}

impl TaggedLogger {
    pub(crate) fn new(sink: Arc<dyn Logger>, tag: &str, min_level: LogLevel) -> Self {
        Self {
            sink,
            tag: Arc::from(tag),
            min_level,
        }
    }

    /// Logger for a nested component, tagged `"<parent> -> <name>"`.
    pub(crate) fn wrap(&self, name: &str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            tag: Arc::from(format!("{} -> {}", self.tag, name)),
            min_level: self.min_level,
        }
    }

    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }

    fn emit(
        &self,
        level: LogLevel,
        message: impl FnOnce() -> String,
        cause: Option<&(dyn Error + 'static)>,
    ) {
        if level >= self.min_level {
            self.sink.log(&self.tag, level, &message(), cause);
        }
    }

    pub(crate) fn verbose(&self, message: impl FnOnce() -> String) {
        self.emit(LogLevel::Verbose, message, None);
    }

    pub(crate) fn debug(&self, message: impl FnOnce() -> String) {
        self.emit(LogLevel::Debug, message, None);
    }

    pub(crate) fn info(&self, message: impl FnOnce() -> String) {
        self.emit(LogLevel::Info, message, None);
    }

    pub(crate) fn error(&self, message: impl FnOnce() -> String, cause: &(dyn Error + 'static)) {
        self.emit(LogLevel::Error, message, Some(cause));
    }
}

impl fmt::Debug for TaggedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedLogger")
            .field("tag", &self.tag)
            .field("min_level", &self.min_level)
            .finish()
    }
}
