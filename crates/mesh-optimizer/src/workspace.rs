//! Per-call scratch directory that removes itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::OptimizeError;

/// Base name of the interchange file inside a workspace.
pub const MESH_FILE_STEM: &str = "csg";

/// Where workspaces are created and whether they outlive the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory. `None` means the system temp directory.
    pub root: Option<PathBuf>,
    /// Directory name prefix; a random suffix is appended.
    pub prefix: String,
    /// Keep the directory after the call, for debugging engine runs.
    pub retain: bool,
}

impl WorkspaceConfig {
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "meshopt".to_string(),
            retain: false,
        }
    }
}

/// A uniquely named directory owned by exactly one optimization call.
///
/// Removed by [`ScopedWorkspace::release`], or on drop if the call exits
/// any other way. Never shared between calls.
#[derive(Debug)]
pub struct ScopedWorkspace {
    dir: PathBuf,
    mesh_path: PathBuf,
    retain: bool,
    released: bool,
}

impl ScopedWorkspace {
    /// Create a fresh directory for a mesh file with the given extension.
    pub fn acquire(config: &WorkspaceConfig, extension: &str) -> Result<Self, OptimizeError> {
        let root = absolute(&config.root_dir())?;
        fs::create_dir_all(&root).map_err(|source| OptimizeError::Io {
            action: "create workspace root",
            path: root.clone(),
            source,
        })?;

        let dir = root.join(format!("{}-{}", config.prefix, Uuid::new_v4().simple()));
        // create_dir rather than create_dir_all: an existing directory is an error
        fs::create_dir(&dir).map_err(|source| OptimizeError::Io {
            action: "create workspace",
            path: dir.clone(),
            source,
        })?;

        let mesh_path = dir.join(format!("{MESH_FILE_STEM}.{extension}"));
        debug!(dir = %dir.display(), "workspace acquired");
        Ok(Self {
            dir,
            mesh_path,
            retain: config.retain,
            released: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of the interchange file.
    pub fn mesh_path(&self) -> &Path {
        &self.mesh_path
    }

    pub fn is_retained(&self) -> bool {
        self.retain
    }

    /// Remove the directory now and report whether that worked.
    pub fn release(mut self) -> Result<(), OptimizeError> {
        self.released = true;
        self.cleanup().map_err(|source| OptimizeError::Io {
            action: "remove workspace",
            path: self.dir.clone(),
            source,
        })
    }

    fn cleanup(&self) -> io::Result<()> {
        if self.retain {
            info!(dir = %self.dir.display(), "workspace retained");
            return Ok(());
        }
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScopedWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.cleanup() {
            warn!(dir = %self.dir.display(), error = %e, "failed to remove workspace");
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, OptimizeError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|source| OptimizeError::Io {
        action: "resolve workspace root",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(root: &Path) -> WorkspaceConfig {
        WorkspaceConfig {
            root: Some(root.to_path_buf()),
            ..WorkspaceConfig::default()
        }
    }

    fn scratch_root() -> PathBuf {
        std::env::temp_dir().join(format!("workspace-unit-{}", Uuid::new_v4()))
    }

    #[test]
    fn acquire_creates_unique_dirs() {
        let root = scratch_root();
        let config = config_in(&root);
        let a = ScopedWorkspace::acquire(&config, "stl").unwrap();
        let b = ScopedWorkspace::acquire(&config, "stl").unwrap();

        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert_eq!(a.mesh_path(), a.dir().join("csg.stl"));
        assert!(a.dir().file_name().unwrap().to_string_lossy().starts_with("meshopt-"));

        a.release().unwrap();
        b.release().unwrap();
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn drop_removes_dir() {
        let root = scratch_root();
        let dir = {
            let ws = ScopedWorkspace::acquire(&config_in(&root), "stl").unwrap();
            fs::write(ws.mesh_path(), b"solid csg\nendsolid csg\n").unwrap();
            ws.dir().to_path_buf()
        };
        assert!(!dir.exists());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn release_tolerates_missing_dir() {
        let root = scratch_root();
        let ws = ScopedWorkspace::acquire(&config_in(&root), "stl").unwrap();
        fs::remove_dir_all(ws.dir()).unwrap();
        assert!(ws.release().is_ok());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn retained_dir_is_kept() {
        let root = scratch_root();
        let config = WorkspaceConfig {
            retain: true,
            ..config_in(&root)
        };
        let ws = ScopedWorkspace::acquire(&config, "stl").unwrap();
        let dir = ws.dir().to_path_buf();
        assert!(ws.is_retained());
        ws.release().unwrap();
        assert!(dir.is_dir());
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let relative = PathBuf::from(format!("workspace-unit-{}", Uuid::new_v4()));
        let ws = ScopedWorkspace::acquire(&config_in(&relative), "stl").unwrap();
        assert!(ws.mesh_path().is_absolute());
        assert!(ws.dir().starts_with(std::env::current_dir().unwrap()));
        ws.release().unwrap();
        fs::remove_dir_all(&relative).unwrap();
    }
}
