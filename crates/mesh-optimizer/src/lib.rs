//! Mesh optimization and repair for CSG solids.
//!
//! A solid is written to an interchange file in a fresh workspace, a repair
//! script is rendered for it and run by an external mesh engine, and the
//! result is read back as a new solid.
//!
//! ```no_run
//! use mesh_optimizer::{OptimizationParameters, Optimizer, OptimizerConfig};
//! use mesh_types::primitives::cube_minus_sphere;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let solid = cube_minus_sphere(2.0, 1.2, 32)?;
//! let optimizer = Optimizer::from_config(OptimizerConfig::from_env()?);
//! let params = OptimizationParameters::new(1e-6, 1e-4, 0.05, 0.2);
//! let repaired = optimizer.optimize(&solid, &params)?;
//! # let _ = repaired;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod optimizer;
pub mod params;
pub mod scale;
pub mod template;
pub mod workspace;

pub use config::OptimizerConfig;
pub use errors::OptimizeError;
pub use optimizer::{optimize, optimize_scaled, optimize_scaled_with, optimize_with, Optimizer};
pub use params::{OptimizationParameters, DEFAULT_CREASE_EDGE_ANGLE, DEFAULT_MAX_ITERATIONS};
pub use scale::{with_canonical_scale, ScaleError};
pub use template::{bundled_template, Bindings, ScriptTemplate, TemplateError};
pub use workspace::{ScopedWorkspace, WorkspaceConfig};
