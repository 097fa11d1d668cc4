//! Failure taxonomy of the shell.
//!
//! Every sub-command returns [`CliError`]; the entrypoint maps each variant
//! to an exit code and decides how much of it the user gets to see:
//!
//! | variant     | shown as                         | exit |
//! |-------------|----------------------------------|------|
//! | `Abort`     | `Aborted!`                       | 1    |
//! | `Usage`     | the error's own message          | 1    |
//! | `Unhandled` | full report on the error log     | 1    |

// External crates
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing_error::SpanTrace;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum CliError {
    /// The user interrupted an interactive step.
    #[error("Aborted!")]
    Abort,

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Unhandled(#[from] UnhandledError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// Label used for the failed-invocations metric.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Abort => "abort",
            CliError::Usage(_) => "usage",
            CliError::Unhandled(_) => "unhandled",
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(error: anyhow::Error) -> Self {
        CliError::Unhandled(UnhandledError::capture(error))
    }
}

/// Errors the user can fix: bad arguments, missing files. Never shown with a trace.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error(transparent)]
    Arguments(#[from] clap::Error),

    #[error("Failed to find config file at {}", path.display())]
    MissingResource { path: PathBuf },

    #[error("{0}")]
    BadParameter(String),
}

impl UsageError {
    /// Text printed to stderr for this error.
    pub fn render(&self) -> String {
        match self {
            UsageError::Arguments(err) => err.render().to_string(),
            other => format!("Error: {other}\n"),
        }
    }
}

/// Anything else. Carries the context needed to render a readable report.
pub struct UnhandledError {
    error: anyhow::Error,
    backtrace: Option<Backtrace>,
    span_trace: SpanTrace,
}

impl UnhandledError {
    /// Wrap `error`, capturing the current span trace. A backtrace is forced
    /// here only when the error did not bring one of its own.
    pub fn capture(error: anyhow::Error) -> Self {
        let backtrace = match error.backtrace().status() {
            BacktraceStatus::Captured => None,
            _ => Some(Backtrace::force_capture()),
        };

        Self {
            error,
            backtrace,
            span_trace: SpanTrace::capture(),
        }
    }

    /// Wrap the payload of a caught panic.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::capture(anyhow::anyhow!("Sub-command panicked: {}", panic_message(payload)))
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn backtrace(&self) -> &Backtrace {
        self.backtrace
            .as_ref()
            .unwrap_or_else(|| self.error.backtrace())
    }

    pub fn span_trace(&self) -> &SpanTrace {
        &self.span_trace
    }
}

impl fmt::Debug for UnhandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnhandledError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UnhandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for UnhandledError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Text carried by a panic payload (`panic!` with a literal or a format string).
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Unknown panic")
}

/// Failures while assembling the shell itself, before any log sink exists.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to open log file at {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] io::Error),
}
