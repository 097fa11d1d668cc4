// Local crates
use crate::helpers::build_info;
use crate::instrumentation::report::MAX_CONTENT_WIDTH;

// External crates
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

pub const DEFAULT_MONITORING_PORT: u16 = 8000;

/// Two-letter short form kept for existing deployments; clap short flags are single characters.
const LEGACY_LEAK_FLAG: &str = "-dl";

#[derive(Debug, Parser)]
#[command(
    name = build_info::PACKAGE_NAME,
    version = build_info::nice_version_name(),
    about = "Run and manage DataHub Actions pipelines",
    max_term_width = MAX_CONTENT_WIDTH,
    arg_required_else_help = true,
    after_help = "\
EXAMPLES:
    datahub-actions actions run -c pipeline.toml
    datahub-actions --enable-monitoring --monitoring-port 9000 actions run -c pipeline.toml"
)]
pub struct Cli {
    /// Enable prometheus monitoring endpoint. You can set the portnumber with --monitoring-port.
    #[arg(long)]
    pub enable_monitoring: bool,

    /// Prometheus monitoring endpoint will be available on :<PORT>/metrics.
    /// To enable monitoring use the --enable-monitoring flag
    #[arg(long, value_name = "PORT", default_value_t = DEFAULT_MONITORING_PORT)]
    pub monitoring_port: u16,

    #[arg(long, overrides_with = "no_debug")]
    debug: bool,

    #[arg(long = "no-debug", overrides_with = "debug", hide_short_help = true)]
    no_debug: bool,

    /// Run memory leak detection. Also accepted as -dl.
    #[arg(long)]
    pub detect_memory_leaks: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// `Some` only when `--debug` or `--no-debug` was given.
    pub fn debug_flag(&self) -> Option<bool> {
        explicit_flag(self.debug, self.no_debug)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Execute and manage action pipelines
    Actions(ActionsArgs),
}

#[derive(Debug, Args)]
pub struct ActionsArgs {
    #[command(subcommand)]
    pub command: ActionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ActionsCommand {
    /// Run one or more action pipelines from their config files
    Run {
        /// Pipeline config file (TOML). Repeat to run several pipelines.
        #[arg(short, long = "config", value_name = "FILE", required = true)]
        config: Vec<PathBuf>,

        #[arg(long, overrides_with = "no_debug")]
        debug: bool,

        #[arg(long = "no-debug", overrides_with = "debug", hide_short_help = true)]
        no_debug: bool,
    },

    /// Print version number and exit
    Version,
}

impl ActionsCommand {
    pub fn debug_flag(&self) -> Option<bool> {
        match self {
            ActionsCommand::Run {
                debug, no_debug, ..
            } => explicit_flag(*debug, *no_debug),
            ActionsCommand::Version => None,
        }
    }
}

fn explicit_flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

/// Rewrite `-dl` into `--detect-memory-leaks` among the top-level options,
/// i.e. before the sub-command name. Everything after it is left alone.
pub fn normalize_args<I, T>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    let subcommands: Vec<&str> = command.get_subcommands().map(|sub| sub.get_name()).collect();

    let mut args = argv.into_iter().map(Into::into);
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();
    let mut in_group_options = true;
    let mut expects_value = false;

    for arg in args {
        if in_group_options {
            if expects_value {
                expects_value = false;
            } else if arg == LEGACY_LEAK_FLAG {
                normalized.push(OsString::from("--detect-memory-leaks"));
                continue;
            } else if arg == "--monitoring-port" {
                expects_value = true;
            } else if arg == "--" || subcommands.iter().any(|name| arg == **name) {
                in_group_options = false;
            }
        }
        normalized.push(arg);
    }

    normalized
}
