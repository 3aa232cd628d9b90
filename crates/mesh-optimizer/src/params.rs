use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::OptimizeError;
use crate::template::{placeholders, Bindings};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_CREASE_EDGE_ANGLE: f64 = 5.0;

/// Parameters for one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParameters {
    /// Distance below which vertices are merged.
    pub tolerance: f64,
    /// Tolerance used while resolving self-intersections.
    pub max_tolerance: f64,
    pub min_edge_length: f64,
    pub max_edge_length: f64,
    /// Iterations of edge-length adjustment.
    pub max_iterations: u32,
    /// Dihedral angle in degrees above which an edge is kept as a crease.
    pub crease_edge_angle: f64,
}

impl OptimizationParameters {
    /// Parameters with the default iteration count and crease angle.
    pub fn new(
        tolerance: f64,
        max_tolerance: f64,
        min_edge_length: f64,
        max_edge_length: f64,
    ) -> Self {
        Self {
            tolerance,
            max_tolerance,
            min_edge_length,
            max_edge_length,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            crease_edge_angle: DEFAULT_CREASE_EDGE_ANGLE,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_crease_edge_angle(mut self, degrees: f64) -> Self {
        self.crease_edge_angle = degrees;
        self
    }

    /// Check value ranges and ordering before anything reaches the engine.
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let named = [
            ("tolerance", self.tolerance),
            ("max_tolerance", self.max_tolerance),
            ("min_edge_length", self.min_edge_length),
            ("max_edge_length", self.max_edge_length),
            ("crease_edge_angle", self.crease_edge_angle),
        ];
        if let Some((name, value)) = named.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{name} must be finite, got {value}"));
        }
        if self.tolerance <= 0.0 {
            return invalid(format!("tolerance must be positive, got {}", self.tolerance));
        }
        if self.tolerance > self.max_tolerance {
            return invalid(format!(
                "tolerance ({}) exceeds max_tolerance ({})",
                self.tolerance, self.max_tolerance
            ));
        }
        if self.min_edge_length <= 0.0 {
            return invalid(format!(
                "min_edge_length must be positive, got {}",
                self.min_edge_length
            ));
        }
        if self.min_edge_length > self.max_edge_length {
            return invalid(format!(
                "min_edge_length ({}) exceeds max_edge_length ({})",
                self.min_edge_length, self.max_edge_length
            ));
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".to_string());
        }
        if !(0.0..=180.0).contains(&self.crease_edge_angle) {
            return invalid(format!(
                "crease_edge_angle must be within [0, 180] degrees, got {}",
                self.crease_edge_angle
            ));
        }
        Ok(())
    }

    /// Bindings for every placeholder of the repair procedure.
    pub fn bindings(&self, mesh_path: &Path) -> Bindings {
        Bindings::new()
            .quoted_path(placeholders::FILENAME, mesh_path)
            .number(placeholders::REMOVE_DOUBLES_TOL, self.tolerance)
            .number(placeholders::CREASE_EDGE_ANGLE, self.crease_edge_angle)
            .number(placeholders::RESOLVE_TOL, self.max_tolerance)
            .number(placeholders::MIN_EDGE_LENGTH, self.min_edge_length)
            .number(placeholders::MAX_EDGE_LENGTH, self.max_edge_length)
            .integer(placeholders::MAX_ADJ_ITER, self.max_iterations)
    }
}

fn invalid(reason: String) -> Result<(), OptimizeError> {
    Err(OptimizeError::InvalidParameters { reason })
}
