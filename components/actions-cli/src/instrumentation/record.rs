// External crates
use chrono::{DateTime, Local};
use std::fmt;

/// Severity of a log record, ordered from most to least verbose.
///
/// `tracing::Level` orders the other way around (TRACE is the "largest"),
/// which makes threshold comparisons read backwards. Every threshold in the
/// registry is expressed with this type instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Severity::Trace,
            tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `pad` keeps width/alignment flags working, e.g. `{:<8}`
        f.pad(self.as_str())
    }
}

/// A single formatted-ready log event, detached from `tracing` internals.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub target: String,
    pub line: u32,
    pub message: String,
}

impl LogRecord {
    /// Render the record as
    /// `[asctime] LEVEL    {target:line} - message` followed by a newline.
    pub fn format(&self) -> String {
        format!(
            "[{}] {:<8} {{{}:{}}} - {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            self.severity,
            self.target,
            self.line,
            self.message
        )
    }
}
