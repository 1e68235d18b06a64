//! Engine configuration: an optional JSON file, then environment overrides.
//!
//! Command-line flags, when the binary is used, are applied on top by the caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::context::RunSettings;

pub const ENV_FLOWS_DIR: &str = "FLOWS_FLOWS_DIR";
pub const ENV_SCRIPTS_DIR: &str = "FLOWS_SCRIPTS_DIR";
pub const ENV_RUN_DIR: &str = "FLOWS_RUN_DIR";
pub const ENV_MAX_NODES: &str = "FLOWS_MAX_NODES";
pub const ENV_STEP_LIMIT_MULTIPLIER: &str = "FLOWS_STEP_LIMIT_MULTIPLIER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("cannot read config {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("{var} must be a positive integer, got '{value}'")]
  InvalidEnv { var: &'static str, value: String },
}

/// Node-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Directory of `*.json` flow definitions.
  pub flows_dir: PathBuf,
  /// Directory of `*.rhai` scripts; skipped when it does not exist.
  pub scripts_dir: PathBuf,
  /// Where `run.log.json` is written.
  pub run_dir: PathBuf,
  pub default_max_nodes: usize,
  pub step_limit_multiplier: usize,
  /// Failure flow to dispatch instead of the first flow of kind `failure`.
  pub failure_flow: Option<Uuid>,
  pub tool_paths: BTreeMap<String, PathBuf>,
  /// Scratch directory; the system temp dir when unset.
  pub temp_dir: Option<PathBuf>,
  pub is_docker: bool,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      flows_dir: PathBuf::from("flows"),
      scripts_dir: PathBuf::from("scripts"),
      run_dir: PathBuf::from(".flows"),
      default_max_nodes: 50,
      step_limit_multiplier: 10,
      failure_flow: None,
      tool_paths: BTreeMap::new(),
      temp_dir: None,
      is_docker: false,
    }
  }
}

fn positive(var: &'static str, value: String) -> Result<usize, ConfigError> {
  match value.trim().parse::<usize>() {
    Ok(n) if n > 0 => Ok(n),
    _ => Err(ConfigError::InvalidEnv { var, value }),
  }
}

impl EngineConfig {
  /// Reads a JSON config file; missing keys keep their defaults.
  #[instrument(level = "trace")]
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Applies overrides read through `lookup` (an environment accessor).
  pub fn with_overrides(
    mut self,
    lookup: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, ConfigError> {
    if let Some(v) = lookup(ENV_FLOWS_DIR) {
      self.flows_dir = v.into();
    }
    if let Some(v) = lookup(ENV_SCRIPTS_DIR) {
      self.scripts_dir = v.into();
    }
    if let Some(v) = lookup(ENV_RUN_DIR) {
      self.run_dir = v.into();
    }
    if let Some(v) = lookup(ENV_MAX_NODES) {
      self.default_max_nodes = positive(ENV_MAX_NODES, v)?;
    }
    if let Some(v) = lookup(ENV_STEP_LIMIT_MULTIPLIER) {
      self.step_limit_multiplier = positive(ENV_STEP_LIMIT_MULTIPLIER, v)?;
    }
    Ok(self)
  }

  /// Config file (if any) with process environment overrides applied.
  pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
    let base = match path {
      Some(p) => Self::load(p)?,
      None => Self::default(),
    };
    let config = base.with_overrides(|k| std::env::var(k).ok())?;
    debug!(config = ?config, "engine configuration");
    Ok(config)
  }

  /// Settings every context of a run is built with.
  pub fn run_settings(&self) -> RunSettings {
    let defaults = RunSettings::default();
    RunSettings {
      temp_dir: self.temp_dir.clone().unwrap_or(defaults.temp_dir),
      tool_paths: self.tool_paths.clone(),
      is_docker: self.is_docker,
      default_max_nodes: self.default_max_nodes,
      step_limit_multiplier: self.step_limit_multiplier,
      ..defaults
    }
  }
}
