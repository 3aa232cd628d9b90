#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use mesh_io::StlCodec;
use mesh_optimizer::{Optimizer, WorkspaceConfig};
use repair_engine::MockEngine;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Install a test subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh directory under the system temp dir, removed on drop.
pub struct TestDir(PathBuf);

impl TestDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("mesh-optimizer-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Names of everything directly inside the directory.
    pub fn entries(&self) -> Vec<String> {
        fs::read_dir(&self.0)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

pub fn workspace_in(dir: &TestDir) -> WorkspaceConfig {
    WorkspaceConfig {
        root: Some(dir.path().to_path_buf()),
        ..WorkspaceConfig::default()
    }
}

/// Optimizer over `engine` whose workspaces are created inside `dir`.
pub fn optimizer_in(dir: &TestDir, engine: MockEngine) -> Optimizer<MockEngine, StlCodec> {
    init_tracing();
    Optimizer::new(engine, StlCodec::ascii()).with_workspace_config(workspace_in(dir))
}
