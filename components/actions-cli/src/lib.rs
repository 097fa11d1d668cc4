//! DataHub Actions command-line shell.
//!
//! The binary in `main.rs` is a thin wrapper around [`entrypoint::entrypoint::run`];
//! everything else lives here so the integration tests can drive the shell
//! with captured console streams.

pub mod actions;
pub mod cli;
pub mod entrypoint;
pub mod errors;
pub mod helpers;
pub mod instrumentation;
pub mod metrics;
