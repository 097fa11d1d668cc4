//! Logging bootstrap for the `datahub_actions` logger.
//!
//! ```text
//!                      ┌──────────── datahub_actions (propagate = false) ───────────┐
//! event ─▶ RoutingLayer│  info sink  → stdout   (≤ INFO)                             │
//!                      │  error sink → stderr   (≥ WARNING)                          │
//!                      │  file sink  → actions.out, rotated at midnight, 10 backups │
//!                      └────────────────────────────────────────────────────────────┘
//!          other targets ─▶ root (ambient threshold) → stderr
//! ```
//!
//! The dedicated logger never propagates to the root, so libraries that
//! retune the root logger at runtime cannot silence or redirect it.

// Local crates
use crate::errors::errors::{BootstrapError, panic_message};
use crate::helpers::env::{DEBUG_ENV_VAR, EnvMap, get_boolean_env_variable};
use crate::instrumentation::layer::RoutingLayer;
use crate::instrumentation::record::Severity;
use crate::instrumentation::registry::{self, DEDICATED_LOGGER, LoggerRegistry, SharedRegistry, Sink};
use crate::instrumentation::rotation::TimedRotatingFile;
use crate::instrumentation::stream::ShellIo;

// External crates
use std::fmt;
use std::panic;
use std::path::PathBuf;
use tracing::Dispatch;
use tracing::subscriber::NoSubscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{prelude::*, registry::Registry};

pub const LOGGING_FILE_LOCATION: &str = "/tmp/datahub/logs/actions/actions.out";
pub const LOG_BACKUP_COUNT: usize = 10;

pub const ROOT_SINK: &str = "root";
pub const INFO_SINK: &str = "info";
pub const ERROR_SINK: &str = "error";
pub const FILE_SINK: &str = "file";

/// Thresholds applied at startup, derived from the debug switch alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityPolicy {
    /// Ambient threshold of the root logger. Changing it affects every
    /// target outside `datahub_actions` in this process.
    pub root: Severity,
    pub logger: Severity,
    pub info_sink: Severity,
    pub error_sink: Severity,
    pub file_sink: Severity,
}

impl SeverityPolicy {
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            Self {
                root: Severity::Info,
                logger: Severity::Debug,
                info_sink: Severity::Debug,
                error_sink: Severity::Warning,
                file_sink: Severity::Debug,
            }
        } else {
            Self {
                root: Severity::Warning,
                logger: Severity::Info,
                info_sink: Severity::Info,
                error_sink: Severity::Warning,
                file_sink: Severity::Info,
            }
        }
    }
}

/// `--debug` turns debug on; without it `DATAHUB_DEBUG` decides.
/// `--no-debug` only restates the default and never overrides the environment.
pub fn resolve_debug(flag: Option<bool>, env: &EnvMap) -> bool {
    flag == Some(true) || get_boolean_env_variable(env, DEBUG_ENV_VAR, false)
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub log_file: PathBuf,
    pub backup_count: usize,
    pub debug: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(LOGGING_FILE_LOCATION),
            backup_count: LOG_BACKUP_COUNT,
            debug: false,
        }
    }
}

/// Live logging setup. Dropping it flushes the file sink.
pub struct LoggingHandle {
    registry: SharedRegistry,
    dispatch: Dispatch,
    _file_guard: WorkerGuard,
}

impl LoggingHandle {
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Re-apply a severity policy to the root, the dedicated logger and its sinks.
    pub fn apply_policy(&self, policy: SeverityPolicy) {
        let mut registry = registry::write(&self.registry);
        registry.root_mut().set_level(policy.root);

        let logger = registry.logger(DEDICATED_LOGGER);
        logger.set_level(policy.logger);
        for (name, level) in [
            (INFO_SINK, policy.info_sink),
            (ERROR_SINK, policy.error_sink),
            (FILE_SINK, policy.file_sink),
        ] {
            if let Some(sink) = logger.sink_mut(name) {
                sink.set_level(level);
            }
        }
    }
}

impl fmt::Debug for LoggingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Build the registry, its sinks and the subscriber around them.
///
/// The subscriber is returned inside the handle rather than installed, so the
/// caller decides whether it becomes the global or a scoped default.
pub fn init_logging(
    settings: &LoggingSettings,
    io: &ShellIo,
) -> Result<LoggingHandle, BootstrapError> {
    let policy = SeverityPolicy::for_debug(settings.debug);

    let file = TimedRotatingFile::open(&settings.log_file, settings.backup_count).map_err(
        |source| BootstrapError::LogFile {
            path: settings.log_file.clone(),
            source,
        },
    )?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(file);

    let mut registry = LoggerRegistry::new(policy.root);
    registry
        .root_mut()
        .add_sink(Sink::new(ROOT_SINK, Severity::Trace, io.stderr.clone()));

    let logger = registry.logger(DEDICATED_LOGGER);
    logger.add_sink(
        Sink::new(INFO_SINK, policy.info_sink, io.stdout.clone()).with_max_level(Severity::Info),
    );
    logger.add_sink(Sink::new(ERROR_SINK, policy.error_sink, io.stderr.clone()));
    logger.add_sink(Sink::new(FILE_SINK, policy.file_sink, file_writer));
    logger.set_propagate(false);
    logger.set_level(policy.logger);

    let registry = registry.into_shared();
    let subscriber = Registry::default()
        .with(RoutingLayer::new(registry.clone()))
        .with(ErrorLayer::default());

    Ok(LoggingHandle {
        registry,
        dispatch: Dispatch::new(subscriber),
        _file_guard: file_guard,
    })
}

/// Route panics through the error log instead of the bare panic printer.
///
/// Outside a scoped subscriber (argument parsing, config loading) nothing
/// would record the event, so the previously installed hook prints it instead.
pub fn init_panic_handler() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if !has_subscriber() {
            previous(panic_info);
            return;
        }

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        tracing::error!(
            message = %panic_message(panic_info.payload()),
            location = %location,
            "datahub-actions panicked"
        );
    }));
}

fn has_subscriber() -> bool {
    tracing::dispatcher::get_default(|dispatch| !dispatch.is::<NoSubscriber>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn debug_policy_matches_the_severity_table() {
        let debug = SeverityPolicy::for_debug(true);
        assert_eq!(debug.root, Severity::Info);
        assert_eq!(debug.logger, Severity::Debug);
        assert_eq!(debug.info_sink, Severity::Debug);
        assert_eq!(debug.file_sink, Severity::Debug);
        assert_eq!(debug.error_sink, Severity::Warning);

        let quiet = SeverityPolicy::for_debug(false);
        assert_eq!(quiet.root, Severity::Warning);
        assert_eq!(quiet.logger, Severity::Info);
        assert_eq!(quiet.info_sink, Severity::Info);
        assert_eq!(quiet.file_sink, Severity::Info);
        assert_eq!(quiet.error_sink, Severity::Warning);
    }

    #[test]
    fn debug_flag_or_environment_enables_debug() {
        for env_value in [None, Some("true"), Some("1"), Some("false"), Some("TRUE"), Some("no")] {
            let vars = match env_value {
                Some(value) => env(&[(DEBUG_ENV_VAR, value)]),
                None => EnvMap::new(),
            };
            let env_debug = matches!(env_value, Some("true" | "1" | "TRUE"));

            assert!(resolve_debug(Some(true), &vars));
            assert_eq!(resolve_debug(Some(false), &vars), env_debug, "env = {env_value:?}");
            assert_eq!(resolve_debug(None, &vars), env_debug, "env = {env_value:?}");
        }
    }

    #[test]
    fn dedicated_logger_is_detached_from_root() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            log_file: dir.path().join("actions.out"),
            ..LoggingSettings::default()
        };
        let handle = init_logging(&settings, &ShellIo::captured()).unwrap();

        let registry = registry::read(handle.registry());
        let logger = registry.get(DEDICATED_LOGGER).unwrap();
        assert!(!logger.propagate());
        assert_eq!(logger.level(), Some(Severity::Info));
        assert_eq!(
            logger.sinks().iter().map(Sink::name).collect::<Vec<_>>(),
            vec![INFO_SINK, ERROR_SINK, FILE_SINK]
        );
        assert_eq!(registry.root().level(), Some(Severity::Warning));
    }

    #[test]
    fn subscriber_presence_follows_the_scoped_default() {
        assert!(!has_subscriber());

        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            log_file: dir.path().join("actions.out"),
            ..LoggingSettings::default()
        };
        let handle = init_logging(&settings, &ShellIo::captured()).unwrap();

        assert!(tracing::dispatcher::with_default(handle.dispatch(), has_subscriber));
    }

    #[test]
    fn unwritable_log_location_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let settings = LoggingSettings {
            log_file: blocker.join("actions.out"),
            ..LoggingSettings::default()
        };

        let err = init_logging(&settings, &ShellIo::captured()).unwrap_err();
        assert!(matches!(err, BootstrapError::LogFile { .. }));
    }
}
