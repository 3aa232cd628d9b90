use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr lines, in arrival order.
    pub output: String,
    pub elapsed: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a failed run into the matching [`EngineError`].
    pub fn ensure_success(&self) -> Result<(), EngineError> {
        match self.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(EngineError::NonZeroExit {
                code,
                output: self.output.clone(),
            }),
            None => Err(EngineError::Terminated {
                output: self.output.clone(),
            }),
        }
    }
}

/// Failures of the external engine process.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine exited with code {code}")]
    NonZeroExit { code: i32, output: String },

    #[error("engine was terminated without an exit code")]
    Terminated { output: String },

    #[error("engine did not finish within {after:?}")]
    Timeout { after: Duration },

    #[error("engine left no output file at {path}")]
    MissingOutput { path: PathBuf },

    #[error("engine output at {path} has no triangles")]
    EmptyOutput { path: PathBuf },
}

impl EngineError {
    /// Captured engine output, when the failure has any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { output, .. } | Self::Terminated { output } => Some(output),
            _ => None,
        }
    }
}

/// How to launch the engine process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the script path.
    pub args: Vec<String>,
    /// File name the rendered script is written to inside the workspace.
    pub script_file_name: String,
    /// Kill the engine after this many seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl EngineConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "ugshell".to_string(),
            args: vec!["-ex".to_string()],
            script_file_name: "optimize-and-repair.lua".to_string(),
            timeout_secs: Some(600),
        }
    }
}
