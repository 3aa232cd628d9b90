//! Run a mesh operation at a canonical size.
//!
//! Edge-length driven remeshing depends on absolute units, so the same shape
//! modelled in millimetres and in metres would come back with very different
//! triangle densities. Scaling the smallest bounding-box dimension to a fixed
//! size first makes the operation behave the same at every input scale.

use mesh_types::Solid;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ScaleError {
    #[error("minimum bounding-box dimension is {size}")]
    DegenerateGeometry { size: f64 },

    #[error("canonical size must be positive and finite, got {size}")]
    InvalidScale { size: f64 },
}

/// Scale factor that brings `solid`'s minimum dimension to `target`.
pub fn canonical_factor(solid: &Solid, target: f64) -> Result<f64, ScaleError> {
    if !(target.is_finite() && target > 0.0) {
        return Err(ScaleError::InvalidScale { size: target });
    }
    let size = solid.bounding_box().min_dimension();
    if !(size.is_finite() && size > 0.0) {
        return Err(ScaleError::DegenerateGeometry { size });
    }
    Ok(target / size)
}

/// Scale `solid` about the origin so its minimum dimension equals `target`,
/// hand the scaled copy to `process`, then undo the scaling on the result.
///
/// The input solid is never modified.
pub fn with_canonical_scale<E, F>(solid: &Solid, target: f64, process: F) -> Result<Solid, E>
where
    E: From<ScaleError>,
    F: FnOnce(Solid) -> Result<Solid, E>,
{
    let scale_up = canonical_factor(solid, target)?;
    debug!(canonical_size = target, scale_up, "normalizing solid");
    let processed = process(solid.scaled(scale_up))?;
    Ok(processed.scaled(1.0 / scale_up))
}
