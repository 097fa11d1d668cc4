// Local crates
use crate::actions::pipeline::PipelineManager;
use crate::actions::pipeline_config::{PipelineConfig, load_pipeline_config};
use crate::cli::cli::{ActionsArgs, ActionsCommand, Commands};
use crate::entrypoint::context::InvocationContext;
use crate::entrypoint::entrypoint::Dispatcher;
use crate::errors::errors::CliError;
use crate::helpers::build_info;
use crate::helpers::memory::with_leak_detection;
use crate::instrumentation::logging::{LoggingHandle, SeverityPolicy};
use crate::instrumentation::stream::ShellIo;

// External crates
use std::future::Future;
use std::path::PathBuf;
use tokio::signal;
use tracing::instrument;

/// Dispatches the `actions` sub-command tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionsDispatcher;

impl Dispatcher for ActionsDispatcher {
    async fn dispatch(
        &self,
        command: Commands,
        ctx: &InvocationContext,
        logging: &LoggingHandle,
        io: &ShellIo,
    ) -> Result<(), CliError> {
        let Commands::Actions(ActionsArgs { command }) = command;

        let debug = command.debug_flag();
        match command {
            ActionsCommand::Version => {
                version(io);
                Ok(())
            }
            ActionsCommand::Run { config, .. } => {
                if debug == Some(true) {
                    enable_command_debug(logging);
                    tracing::debug!("Debug logging enabled for actions run");
                }
                with_leak_detection(ctx, "actions run", run(config)).await
            }
        }
    }
}

pub fn version(io: &ShellIo) {
    io.stdout.write_str(&format!(
        "{}\n{}\n",
        build_info::version_line(),
        build_info::runtime_line()
    ));
}

/// Raise the dedicated logger and its sinks to DEBUG for the rest of the run.
pub fn enable_command_debug(logging: &LoggingHandle) {
    logging.apply_policy(SeverityPolicy::for_debug(true));
}

#[instrument(name = "actions::run", skip_all, fields(config_files = config_paths.len()))]
async fn run(config_paths: Vec<PathBuf>) -> Result<(), CliError> {
    let mut configs = Vec::with_capacity(config_paths.len());
    for path in &config_paths {
        configs.push(load_pipeline_config(path)?);
    }

    run_pipelines(&mut PipelineManager::new(), configs, shutdown_signal()).await
}

/// Start every enabled pipeline on `manager` and keep them running until
/// `shutdown` resolves. If one fails to start, those already running are
/// stopped before the error is returned.
pub async fn run_pipelines<S>(
    manager: &mut PipelineManager,
    configs: Vec<PipelineConfig>,
    shutdown: S,
) -> Result<(), CliError>
where
    S: Future<Output = ()>,
{
    for config in configs {
        if !config.enabled {
            tracing::info!("Skipping pipeline {} as it is not enabled", config.name);
            continue;
        }

        let name = config.name.clone();
        if let Err(err) = manager.start_pipeline(config) {
            manager.stop_all().await;
            return Err(err.into());
        }
        tracing::info!("Action Pipeline with name '{name}' is now running.");
    }

    if manager.is_empty() {
        tracing::warn!(
            "No valid pipelines were started from the config(s) provided. Please check them for errors."
        );
        return Ok(());
    }

    tracing::info!("{} Action Pipeline(s) running", manager.len());
    shutdown.await;
    tracing::info!(
        "Stopping all running Action Pipelines: {}",
        manager.names().collect::<Vec<_>>().join(", ")
    );
    manager.stop_all().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::pipeline_config::{PipelineOptions, SourceConfig, StageConfig};
    use crate::instrumentation::logging::{LoggingSettings, init_logging};
    use prometheus::Gauge;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn config(name: &str, enabled: bool) -> PipelineConfig {
        PipelineConfig {
            name: name.to_string(),
            enabled,
            source: SourceConfig {
                kind: "kafka".to_string(),
                config: toml::Table::new(),
            },
            filter: None,
            transform: Vec::new(),
            action: StageConfig {
                kind: "hello_world".to_string(),
                config: toml::Table::new(),
            },
            options: PipelineOptions::default(),
        }
    }

    #[tokio::test]
    async fn no_enabled_pipeline_returns_without_waiting() {
        let waited = Arc::new(AtomicBool::new(false));
        let flag = waited.clone();

        let mut manager = PipelineManager::new();
        let outcome = run_pipelines(&mut manager, vec![config("off", false)], async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(outcome.is_ok());
        assert!(!waited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn enabled_pipelines_run_until_shutdown() {
        let waited = Arc::new(AtomicBool::new(false));
        let flag = waited.clone();

        let mut manager = PipelineManager::new();
        let configs = vec![config("on", true), config("off", false)];
        let outcome = run_pipelines(&mut manager, configs, async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert!(outcome.is_ok());
        assert!(waited.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn duplicate_pipeline_names_are_unhandled() {
        let running = Gauge::new("test_running_pipelines", "running pipelines").unwrap();
        let mut manager = PipelineManager::with_gauge(running.clone());

        let outcome = run_pipelines(
            &mut manager,
            vec![config("first", true), config("same", true), config("same", true)],
            async {},
        )
        .await;

        assert!(matches!(outcome, Err(CliError::Unhandled(_))));
        assert!(manager.is_empty());
        assert_eq!(running.get(), 0.0);
    }

    #[tokio::test]
    async fn missing_config_is_a_usage_error() {
        let outcome = run(vec![PathBuf::from("/no/such/pipeline.toml")]).await;

        assert!(matches!(outcome, Err(CliError::Usage(_))));
    }

    #[test]
    fn version_prints_both_diagnostic_lines() {
        let io = ShellIo::captured();
        version(&io);

        let out = io.stdout.contents();
        assert!(out.starts_with("DataHub Actions version: "));
        assert!(out.contains("Rust version: "));
    }

    #[test]
    fn command_debug_raises_the_dedicated_logger() {
        use crate::instrumentation::record::Severity;
        use crate::instrumentation::registry::{self, DEDICATED_LOGGER};

        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            log_file: dir.path().join("actions.out"),
            ..LoggingSettings::default()
        };
        let logging = init_logging(&settings, &ShellIo::captured()).unwrap();

        enable_command_debug(&logging);

        let registry = registry::read(logging.registry());
        assert_eq!(
            registry.get(DEDICATED_LOGGER).unwrap().level(),
            Some(Severity::Debug)
        );
    }
}
