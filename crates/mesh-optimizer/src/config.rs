//! Optimizer configuration: defaults, JSON files and environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use repair_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::OptimizeError;
use crate::workspace::WorkspaceConfig;

/// Path of a JSON config file used as the base for [`OptimizerConfig::from_env`].
pub const ENV_CONFIG: &str = "MESHOPT_CONFIG";
/// Engine program name or path.
pub const ENV_ENGINE: &str = "MESHOPT_ENGINE";
/// Engine timeout in seconds; `0` or `none` disables it.
pub const ENV_TIMEOUT_SECS: &str = "MESHOPT_TIMEOUT_SECS";
pub const ENV_WORKSPACE_ROOT: &str = "MESHOPT_WORKSPACE_ROOT";
pub const ENV_RETAIN_WORKSPACE: &str = "MESHOPT_RETAIN_WORKSPACE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub engine: EngineConfig,
    pub workspace: WorkspaceConfig,
}

impl OptimizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, OptimizeError> {
        serde_json::from_str(json).map_err(|e| OptimizeError::Config {
            reason: format!("failed to parse config: {e}"),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, OptimizeError> {
        let json = fs::read_to_string(path).map_err(|source| OptimizeError::Io {
            action: "read config",
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Defaults, or the file named by `MESHOPT_CONFIG`, with the other
    /// `MESHOPT_*` variables applied on top.
    pub fn from_env() -> Result<Self, OptimizeError> {
        let base = match std::env::var_os(ENV_CONFIG) {
            Some(path) if !path.is_empty() => {
                let path = PathBuf::from(path);
                debug!(path = %path.display(), "loading optimizer config");
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        base.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `MESHOPT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, OptimizeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(ENV_ENGINE).filter(|v| !v.trim().is_empty()) {
            self.engine.program = program;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.engine.timeout_secs = parse_timeout(&raw)?;
        }
        if let Some(root) = lookup(ENV_WORKSPACE_ROOT).filter(|v| !v.trim().is_empty()) {
            self.workspace.root = Some(PathBuf::from(root));
        }
        if let Some(raw) = lookup(ENV_RETAIN_WORKSPACE) {
            self.workspace.retain = parse_flag(ENV_RETAIN_WORKSPACE, &raw)?;
        }
        Ok(self)
    }
}

fn parse_timeout(raw: &str) -> Result<Option<u64>, OptimizeError> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    match value.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(secs)),
        Err(e) => Err(OptimizeError::Config {
            reason: format!("{ENV_TIMEOUT_SECS}={raw:?}: {e}"),
        }),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, OptimizeError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        _ => Err(OptimizeError::Config {
            reason: format!("{key}={raw:?} is not a boolean"),
        }),
    }
}
