//! Deterministic test double for the repair engine.
//!
//! Acts on the interchange file like the real engine (read, modify, write
//! back in place) without launching a process, and records every call so
//! tests can inspect the rendered script and the solid it was handed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use mesh_io::{MeshCodec, StlCodec};
use mesh_types::Solid;
use tracing::debug;

use crate::traits::MeshRepairEngine;
use crate::types::{EngineError, ProcessResult};

/// Mesh transform applied by [`MockBehavior::Transform`].
pub type MeshTransform = Arc<dyn Fn(&Solid) -> Solid + Send + Sync>;

/// What the mock does when run.
#[derive(Clone)]
pub enum MockBehavior {
    /// Leave the file untouched and exit 0.
    Passthrough,
    /// Replace the file's mesh with `f(mesh)` and exit 0.
    Transform(MeshTransform),
    /// Exit with the given code without touching the file.
    ExitCode(i32),
    /// Die without an exit code, as if killed by a signal.
    Terminated,
    /// Fail as if the configured timeout expired.
    Timeout,
    /// Delete the mesh file and exit 0.
    DeleteOutput,
}

impl std::fmt::Debug for MockBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passthrough => write!(f, "Passthrough"),
            Self::Transform(_) => write!(f, "Transform(..)"),
            Self::ExitCode(code) => write!(f, "ExitCode({code})"),
            Self::Terminated => write!(f, "Terminated"),
            Self::Timeout => write!(f, "Timeout"),
            Self::DeleteOutput => write!(f, "DeleteOutput"),
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub script: String,
    pub working_dir: PathBuf,
    /// The mesh found in the working directory, if it could be read.
    pub input: Option<Solid>,
}

/// Deterministic test double for the repair engine.
pub struct MockEngine {
    behavior: MockBehavior,
    mesh_file_name: String,
    codec: StlCodec,
    delay: Duration,
    calls: Mutex<Vec<MockCall>>,
}

impl MockEngine {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            mesh_file_name: "csg.stl".to_string(),
            codec: StlCodec::ascii(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn passthrough() -> Self {
        Self::new(MockBehavior::Passthrough)
    }

    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Solid) -> Solid + Send + Sync + 'static,
    {
        Self::new(MockBehavior::Transform(Arc::new(f)))
    }

    pub fn failing(exit_code: i32) -> Self {
        Self::new(MockBehavior::ExitCode(exit_code))
    }

    /// Sleep this long inside every run, to force overlap in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_mesh_file_name(mut self, name: &str) -> Self {
        self.mesh_file_name = name.to_string();
        self
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn finished(exit_code: Option<i32>, output: &str, started: Instant) -> ProcessResult {
        ProcessResult {
            exit_code,
            output: output.to_string(),
            elapsed: started.elapsed(),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl MeshRepairEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn run(&self, script: &str, working_dir: &Path) -> Result<ProcessResult, EngineError> {
        let started = Instant::now();
        let mesh_path = working_dir.join(&self.mesh_file_name);
        let input = self.codec.read_file(&mesh_path).ok();

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                script: script.to_string(),
                working_dir: working_dir.to_path_buf(),
                input: input.clone(),
            });
        debug!(behavior = ?self.behavior, dir = %working_dir.display(), "mock engine run");

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        match &self.behavior {
            MockBehavior::Passthrough => Ok(Self::finished(Some(0), "done", started)),
            MockBehavior::Transform(f) => {
                let Some(solid) = input else {
                    return Ok(Self::finished(Some(1), "could not read input mesh", started));
                };
                if let Err(e) = self.codec.write_file(&f(&solid), &mesh_path) {
                    return Ok(Self::finished(Some(1), &e.to_string(), started));
                }
                Ok(Self::finished(Some(0), "done", started))
            }
            MockBehavior::ExitCode(code) => {
                Ok(Self::finished(Some(*code), "simulated failure", started))
            }
            MockBehavior::Terminated => Ok(Self::finished(None, "simulated kill", started)),
            MockBehavior::Timeout => Err(EngineError::Timeout {
                after: started.elapsed(),
            }),
            MockBehavior::DeleteOutput => {
                fs::remove_file(&mesh_path).map_err(|source| EngineError::Io {
                    action: "remove",
                    path: mesh_path.clone(),
                    source,
                })?;
                Ok(Self::finished(Some(0), "done", started))
            }
        }
    }
}
