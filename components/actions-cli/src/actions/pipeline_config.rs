// Local crates
use crate::errors::errors::{CliError, UsageError};

// External crates
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One action pipeline as declared in a TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    pub source: SourceConfig,

    #[serde(default)]
    pub filter: Option<FilterConfig>,

    #[serde(default)]
    pub transform: Vec<StageConfig>,

    pub action: StageConfig,

    #[serde(default)]
    pub options: PipelineOptions,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub config: toml::Table,
}

/// A transformer or action stage: a plugin type plus its free-form settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StageConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub config: toml::Table,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FilterConfig {
    pub event_type: EventTypes,

    #[serde(default)]
    pub event: Option<toml::Table>,
}

/// `event_type = "X"` or `event_type = ["X", "Y"]`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EventTypes {
    One(String),
    Many(Vec<String>),
}

impl EventTypes {
    pub fn as_slice(&self) -> &[String] {
        match self {
            EventTypes::One(event_type) => std::slice::from_ref(event_type),
            EventTypes::Many(event_types) => event_types,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PipelineOptions {
    #[serde(default)]
    pub retry_count: Option<u32>,

    #[serde(default)]
    pub failure_mode: Option<FailureMode>,

    #[serde(default)]
    pub failed_events_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureMode {
    Continue,
    Throw,
}

/// Read and parse one pipeline config.
///
/// A missing file is the user's to fix and surfaces as a usage error; a file
/// that exists but does not parse is reported in full.
pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig, CliError> {
    if !path.is_file() {
        return Err(UsageError::MissingResource {
            path: path.to_path_buf(),
        }
        .into());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse pipeline config at {}", path.display()))?;

    tracing::debug!(config_file = %path.display(), "Loaded pipeline config");
    Ok(config)
}
