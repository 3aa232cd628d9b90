//! Runs the repair engine as a child process.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::traits::MeshRepairEngine;
use crate::types::{EngineConfig, EngineError, ProcessResult};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Launches `program [args..] <script>` in the workspace directory.
///
/// stdout and stderr are streamed to `tracing` at debug level under the
/// `repair_engine::output` target and captured into the result.
#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    config: EngineConfig,
}

impl SubprocessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn wait(&self, child: &mut Child, started: Instant) -> Result<ExitStatus, EngineError> {
        let wait_error = |source| EngineError::Io {
            action: "wait for",
            path: PathBuf::from(&self.config.program),
            source,
        };

        let Some(limit) = self.config.timeout() else {
            return child.wait().map_err(wait_error);
        };

        loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                return Ok(status);
            }
            if started.elapsed() >= limit {
                warn!(program = %self.config.program, ?limit, "engine timed out, killing");
                if let Err(e) = child.kill() {
                    warn!(error = %e, "failed to kill engine process");
                }
                // Reap the child so it does not linger as a zombie.
                let _ = child.wait();
                return Err(EngineError::Timeout { after: limit });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Collect output lines until every pipe closes. With a timeout the
    /// readers are abandoned once the deadline passes.
    fn drain(&self, rx: Receiver<String>, started: Instant) -> Result<Vec<String>, EngineError> {
        let Some(limit) = self.config.timeout() else {
            return Ok(rx.iter().collect());
        };

        let mut lines = Vec::new();
        loop {
            match rx.recv_timeout(limit.saturating_sub(started.elapsed())) {
                Ok(line) => lines.push(line),
                Err(RecvTimeoutError::Disconnected) => return Ok(lines),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        program = %self.config.program,
                        ?limit,
                        "engine output still open at deadline"
                    );
                    return Err(EngineError::Timeout { after: limit });
                }
            }
        }
    }
}

impl Default for SubprocessEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MeshRepairEngine for SubprocessEngine {
    fn name(&self) -> &str {
        &self.config.program
    }

    #[instrument(skip(self, script), fields(program = %self.config.program))]
    fn run(&self, script: &str, working_dir: &Path) -> Result<ProcessResult, EngineError> {
        let script_path = working_dir.join(&self.config.script_file_name);
        fs::write(&script_path, script).map_err(|source| EngineError::Io {
            action: "write script",
            path: script_path.clone(),
            source,
        })?;

        let started = Instant::now();
        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&script_path)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        debug!(pid = child.id(), "engine started");

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, "stdout", tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, "stderr", tx.clone()));
        }
        drop(tx);

        let status = self.wait(&mut child, started)?;
        // A background process started by the engine can inherit the output
        // pipes and keep them open after the engine itself exits.
        let lines = self.drain(rx, started)?;

        for reader in readers {
            if reader.join().is_err() {
                warn!("engine output reader panicked");
            }
        }
        let output = lines.join("\n");
        let elapsed = started.elapsed();

        info!(
            exit_code = ?status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            "engine finished"
        );

        Ok(ProcessResult {
            exit_code: status.code(),
            output,
            elapsed,
        })
    }
}

fn spawn_reader<R>(stream: R, name: &'static str, tx: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    debug!(target: "repair_engine::output", stream = name, "{}", line);
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(stream = name, error = %e, "failed to read engine output");
                    break;
                }
            }
        }
    })
}
