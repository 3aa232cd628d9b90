use std::path::PathBuf;

use mesh_io::CodecError;
use mesh_types::MeshError;
use repair_engine::EngineError;

use crate::scale::ScaleError;
use crate::template::TemplateError;

/// Why an optimization call failed. Every variant is terminal for the call;
/// nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input solid is malformed: {0}")]
    InvalidSolid(#[from] MeshError),

    #[error("interchange file error: {0}")]
    Codec(#[from] CodecError),

    #[error("script template error: {0}")]
    TemplateBinding(#[from] TemplateError),

    #[error("mesh repair engine failed: {0}")]
    ProcessFailure(#[from] EngineError),

    #[error("cannot normalize degenerate geometry: minimum bounding-box dimension is {size}")]
    DegenerateGeometry { size: f64 },

    #[error("canonical size must be positive and finite, got {size}")]
    InvalidScale { size: f64 },

    #[error("invalid optimization parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl From<ScaleError> for OptimizeError {
    fn from(e: ScaleError) -> Self {
        match e {
            ScaleError::DegenerateGeometry { size } => Self::DegenerateGeometry { size },
            ScaleError::InvalidScale { size } => Self::InvalidScale { size },
        }
    }
}
