use std::path::PathBuf;

use mesh_types::MeshError;

/// Errors while encoding, decoding or moving interchange files.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed STL at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("binary STL truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("mesh has no triangles")]
    EmptyMesh,

    #[error("vertex coordinate {value} cannot be stored as f32")]
    OutOfRange { value: f64 },

    #[error(transparent)]
    Mesh(#[from] MeshError),
}
