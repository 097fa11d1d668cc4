#![allow(dead_code)]

use datahub_actions::cli::cli::Commands;
use datahub_actions::entrypoint::context::InvocationContext;
use datahub_actions::entrypoint::entrypoint::{Dispatcher, run_with};
use datahub_actions::errors::errors::CliError;
use datahub_actions::helpers::env::EnvMap;
use datahub_actions::instrumentation::logging::LoggingHandle;
use datahub_actions::instrumentation::stream::ShellIo;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Target routed to the dedicated `datahub_actions` logger from test code.
pub const DEDICATED_TARGET: &str = "datahub_actions::probe";

/// Scratch log directory plus the environment pointing the shell at it.
pub struct Sandbox {
    pub dir: TempDir,
    pub env: EnvMap,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvMap::from([(
            "DATAHUB_ACTIONS_LOG_FILE".to_string(),
            dir.path().join("actions.out").display().to_string(),
        )]);
        Self { dir, env }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.path().join("actions.out")
    }

    /// Contents of the active log file. Only complete once `run_with` returned.
    pub fn log_contents(&self) -> String {
        fs::read_to_string(self.log_file()).unwrap_or_default()
    }

    pub fn write_file(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    /// Run the shell with captured console streams.
    pub fn run<D: Dispatcher>(&self, args: &[&str], dispatcher: &D) -> (u8, ShellIo) {
        let io = ShellIo::captured();
        let argv = std::iter::once("datahub-actions").chain(args.iter().copied());
        let code = run_with(argv, &self.env, &io, dispatcher);
        (code, io)
    }
}

/// Dispatcher backed by a closure, so each test states its sub-command inline.
pub struct FnDispatcher<F>(F);

/// Wrap `f` as the sub-command body. It runs on the shell's runtime thread
/// with the scoped subscriber installed.
pub fn dispatcher<F>(f: F) -> FnDispatcher<F>
where
    F: Fn(InvocationContext, &LoggingHandle) -> Result<(), CliError>,
{
    FnDispatcher(f)
}

impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(InvocationContext, &LoggingHandle) -> Result<(), CliError>,
{
    async fn dispatch(
        &self,
        _command: Commands,
        ctx: &InvocationContext,
        logging: &LoggingHandle,
        _io: &ShellIo,
    ) -> Result<(), CliError> {
        (self.0)(*ctx, logging)
    }
}

pub fn lines_containing<'a>(text: &'a str, needle: &str) -> Vec<&'a str> {
    text.lines().filter(|line| line.contains(needle)).collect()
}

pub fn path_str(path: &Path) -> String {
    path.display().to_string()
}
