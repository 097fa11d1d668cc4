//! Bootstrap shell of the `datahub-actions` binary.
//!
//! Order of work for one invocation:
//!
//! 1. parse arguments (help/version exit 0, anything else malformed exits 1)
//! 2. load [`BootstrapConfig`] and resolve the debug switch
//! 3. build the logging registry and install it as the scoped default subscriber
//! 4. optionally start the `/metrics` listener
//! 5. dispatch the sub-command with an [`InvocationContext`]
//! 6. translate the outcome into an exit code

// Local crates
use crate::actions::commands::ActionsDispatcher;
use crate::cli::cli::{Cli, Commands, normalize_args};
use crate::entrypoint::context::InvocationContext;
use crate::errors::errors::{
    BootstrapError, CliError, EXIT_FAILURE, EXIT_SUCCESS, UnhandledError, UsageError,
};
use crate::helpers::{build_info, env::EnvMap, load_config::BootstrapConfig};
use crate::instrumentation::logging::{LoggingHandle, LoggingSettings, init_logging, resolve_debug};
use crate::instrumentation::report::{ReportOptions, format_report};
use crate::instrumentation::stream::ShellIo;
use crate::metrics::http::start_metrics_server;
use crate::metrics::metrics::{
    FAILED_INVOCATIONS_TOTAL, INVOCATIONS_TOTAL, STARTUP_DURATION_SECONDS, register_all,
};

// External crates
use anyhow::Context;
use clap::{Parser, error::ErrorKind};
use std::ffi::OsString;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{Instrument, instrument};

/// Executes a parsed sub-command.
///
/// The shell owns everything around the call; implementors only see the
/// command, the invocation context, the live logging setup and the console.
pub trait Dispatcher {
    fn dispatch(
        &self,
        command: Commands,
        ctx: &InvocationContext,
        logging: &LoggingHandle,
        io: &ShellIo,
    ) -> impl Future<Output = Result<(), CliError>>;
}

/// Run the shell against the process console with the `actions` sub-commands.
pub fn run<I, T>(argv: I, env: &EnvMap) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    run_with(argv, env, &ShellIo::default(), &ActionsDispatcher)
}

/// Run the shell with explicit console streams and sub-command dispatcher.
pub fn run_with<I, T, D>(argv: I, env: &EnvMap, io: &ShellIo, dispatcher: &D) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    D: Dispatcher,
{
    let started = Instant::now();

    let cli = match Cli::try_parse_from(normalize_args(argv)) {
        Ok(cli) => cli,
        Err(err) => return report_parse_error(err, io),
    };

    let (config, logging) = match prepare(&cli, env, io) {
        Ok(prepared) => prepared,
        Err(err) => {
            io.stderr.write_str(&format!("Error: {err}\n"));
            return EXIT_FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            io.stderr
                .write_str(&format!("Error: {}\n", BootstrapError::Runtime(err)));
            return EXIT_FAILURE;
        }
    };

    tracing::dispatcher::with_default(logging.dispatch(), || {
        // A panicking sub-command is one more unhandled error.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(bootstrap(cli, &config, &logging, io, dispatcher, started))
        }))
        .unwrap_or_else(|payload| Err(UnhandledError::from_panic(payload.as_ref()).into()));
        translate(outcome, io)
    })
}

/// Everything that has to succeed before a log sink exists.
fn prepare(
    cli: &Cli,
    env: &EnvMap,
    io: &ShellIo,
) -> Result<(BootstrapConfig, LoggingHandle), BootstrapError> {
    let config = BootstrapConfig::load(env)?;
    let settings = LoggingSettings {
        log_file: config.log_file.clone(),
        backup_count: config.log_backup_count,
        debug: resolve_debug(cli.debug_flag(), env),
    };
    let logging = init_logging(&settings, io)?;
    Ok((config, logging))
}

fn report_parse_error(err: clap::Error, io: &ShellIo) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            io.stdout.write_str(&err.render().to_string());
            EXIT_SUCCESS
        }
        _ => {
            io.stderr.write_str(&UsageError::Arguments(err).render());
            EXIT_FAILURE
        }
    }
}

#[instrument(
    name = "entrypoint::bootstrap",
    skip_all,
    fields(monitoring = cli.enable_monitoring, detect_memory_leaks = cli.detect_memory_leaks)
)]
async fn bootstrap<D: Dispatcher>(
    cli: Cli,
    config: &BootstrapConfig,
    logging: &LoggingHandle,
    io: &ShellIo,
    dispatcher: &D,
    started: Instant,
) -> Result<(), CliError> {
    register_all();

    // Held until dispatch returns; the listener dies with the runtime.
    let _metrics_server = if cli.enable_monitoring {
        let addr = SocketAddr::new(config.monitoring_bind_address, cli.monitoring_port);
        let server = start_metrics_server(addr)
            .await
            .with_context(|| format!("Failed to start monitoring endpoint on {addr}"))?;
        Some(server)
    } else {
        None
    };

    let ctx = InvocationContext {
        detect_memory_leaks: cli.detect_memory_leaks,
    };

    STARTUP_DURATION_SECONDS.set(started.elapsed().as_secs_f64());
    INVOCATIONS_TOTAL.inc();

    let span = tracing::info_span!("entrypoint::dispatch");
    dispatcher
        .dispatch(cli.command, &ctx, logging, io)
        .instrument(span)
        .await
}

/// Map the outcome of a dispatch to an exit code, reporting failures on the way.
fn translate(outcome: Result<(), CliError>, io: &ShellIo) -> u8 {
    let err = match outcome {
        Ok(()) => return EXIT_SUCCESS,
        Err(err) => err,
    };

    FAILED_INVOCATIONS_TOTAL
        .with_label_values(&[err.kind()])
        .inc();

    match &err {
        CliError::Abort => io.stderr.write_str(&format!("{err}\n")),
        CliError::Usage(usage) => io.stderr.write_str(&usage.render()),
        CliError::Unhandled(unhandled) => {
            tracing::error!("{}", format_report(unhandled, &ReportOptions::default()));
            tracing::info!("{}", build_info::version_line());
            tracing::info!("{}", build_info::runtime_line());
        }
    }

    err.exit_code()
}
