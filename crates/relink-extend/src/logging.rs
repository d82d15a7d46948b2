//! Logging collaborator.
//!
//! The batch driver reports through an injected [`Logger`] instead of a
//! global. The default, [`DefaultLogger`], forwards events to `tracing` once
//! a subscriber is installed and otherwise prints warnings and errors on
//! standard error. [`init_stderr`] installs such a subscriber.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

/// One structured event.
#[derive(Clone, Copy)]
pub struct LogEvent<'a> {
    pub level: LogLevel,
    pub message: &'a str,
    pub association: Option<&'a str>,
    pub error: Option<&'a (dyn std::error::Error + 'static)>,
    /// Free-form key/value context.
    pub fields: &'a [(&'a str, &'a dyn fmt::Display)],
}

impl<'a> LogEvent<'a> {
    pub fn new(level: LogLevel, message: &'a str) -> Self {
        Self {
            level,
            message,
            association: None,
            error: None,
            fields: &[],
        }
    }

    pub fn association(mut self, association: &'a str) -> Self {
        self.association = Some(association);
        self
    }

    pub fn error(mut self, error: &'a (dyn std::error::Error + 'static)) -> Self {
        self.error = Some(error);
        self
    }

    pub fn fields(mut self, fields: &'a [(&'a str, &'a dyn fmt::Display)]) -> Self {
        self.fields = fields;
        self
    }
}

impl fmt::Display for LogEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)?;
        if let Some(association) = self.association {
            write!(f, " association={association}")?;
        }
        for (key, value) in self.fields {
            write!(f, " {key}={value}")?;
        }
        if let Some(error) = self.error {
            write!(f, " error={error}")?;
        }
        Ok(())
    }
}

pub trait Logger: Send + Sync {
    fn log(&self, event: &LogEvent<'_>);
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn log(&self, event: &LogEvent<'_>) {
        (**self).log(event)
    }
}

/// Forwards events to the `tracing` dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, event: &LogEvent<'_>) {
        let association = event.association.unwrap_or("-");
        let error = event.error.map(|e| e.to_string());
        let error = error.as_deref();
        let context = event
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        match event.level {
            LogLevel::Debug => tracing::debug!(association, error, context = %context, "{}", event.message),
            LogLevel::Info => tracing::info!(association, error, context = %context, "{}", event.message),
            LogLevel::Warn => tracing::warn!(association, error, context = %context, "{}", event.message),
            LogLevel::Error => tracing::error!(association, error, context = %context, "{}", event.message),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _event: &LogEvent<'_>) {}
}

/// Writes one `level: event` line per event at or above `min_level`.
pub struct WriterLogger {
    min_level: LogLevel,
    out: Mutex<Box<dyn Write + Send>>,
}

impl WriterLogger {
    pub fn new(min_level: LogLevel, out: impl Write + Send + 'static) -> Self {
        Self {
            min_level,
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(LogLevel::Warn, io::stderr())
    }
}

impl fmt::Debug for WriterLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLogger")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl Logger for WriterLogger {
    fn log(&self, event: &LogEvent<'_>) {
        if event.level < self.min_level {
            return;
        }
        let mut out = self.out.lock();
        // A failed write has nowhere left to be reported.
        let _ = writeln!(out, "relink {}: {}", event.level, event);
        let _ = out.flush();
    }
}

/// `tracing` when a dispatcher has been set, the fallback writer otherwise.
#[derive(Debug)]
pub struct DefaultLogger {
    fallback: WriterLogger,
}

impl DefaultLogger {
    pub fn new() -> Self {
        Self::with_fallback(WriterLogger::stderr())
    }

    pub fn with_fallback(fallback: WriterLogger) -> Self {
        Self { fallback }
    }
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for DefaultLogger {
    fn log(&self, event: &LogEvent<'_>) {
        if tracing::dispatcher::has_been_set() {
            TracingLogger.log(event)
        } else {
            self.fallback.log(event)
        }
    }
}

pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(DefaultLogger::new())
}

/// Install a `tracing` subscriber that writes to standard error.
///
/// Fails if a global subscriber is already set.
pub fn init_stderr(max_level: LogLevel) -> anyhow::Result<()> {
    let level = match max_level {
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install stderr subscriber: {err}"))
}
