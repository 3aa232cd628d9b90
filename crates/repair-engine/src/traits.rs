use std::path::Path;

use crate::types::{EngineError, ProcessResult};

/// External mesh-repair engine. Executes a rendered script against the
/// interchange file in `working_dir`, mutating that file in place.
/// Implemented by SubprocessEngine (real engine process) and MockEngine
/// (deterministic test double).
pub trait MeshRepairEngine: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &str;

    /// Run `script` with `working_dir` as the current directory and block
    /// until the engine terminates.
    ///
    /// A returned `ProcessResult` may still describe a failed run; callers
    /// check it with [`ProcessResult::ensure_success`].
    fn run(&self, script: &str, working_dir: &Path) -> Result<ProcessResult, EngineError>;
}
