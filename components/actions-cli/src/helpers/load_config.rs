// Local crates
use crate::helpers::env::EnvMap;
use crate::instrumentation::logging::{LOG_BACKUP_COUNT, LOGGING_FILE_LOCATION};

// External crates
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;

/// Prefix of the environment variables overriding [`BootstrapConfig`] fields,
/// e.g. `DATAHUB_ACTIONS_LOG_FILE`.
pub const ENV_PREFIX: &str = "DATAHUB_ACTIONS";

/// Ambient settings of the shell. Every field has a built-in default.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub log_file: PathBuf,
    pub log_backup_count: usize,
    pub monitoring_bind_address: IpAddr,
}

impl BootstrapConfig {
    /// Defaults layered under `DATAHUB_ACTIONS_*` variables taken from `env`.
    pub fn load(env: &EnvMap) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("log_file", LOGGING_FILE_LOCATION)?
            .set_default("log_backup_count", LOG_BACKUP_COUNT as i64)?
            .set_default("monitoring_bind_address", "0.0.0.0")?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(Some(env.clone())),
            )
            .build()?
            .try_deserialize()
    }
}
