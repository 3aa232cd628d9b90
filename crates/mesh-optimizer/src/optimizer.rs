//! The optimization pipeline: write, render, run, read back.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use mesh_io::{MeshCodec, StlCodec};
use mesh_types::Solid;
use repair_engine::{EngineError, MeshRepairEngine, SubprocessEngine};
use tracing::{debug, info, instrument, warn};

use crate::config::OptimizerConfig;
use crate::errors::OptimizeError;
use crate::params::OptimizationParameters;
use crate::scale::with_canonical_scale;
use crate::template::{bundled_template, ScriptTemplate};
use crate::workspace::{ScopedWorkspace, WorkspaceConfig};

/// Runs the repair procedure on solids through an external engine.
///
/// Holds no per-call state, so one instance can serve concurrent callers
/// when the engine and codec are `Sync`. Each call gets its own workspace.
pub struct Optimizer<E = SubprocessEngine, C = StlCodec> {
    engine: E,
    codec: C,
    template: Arc<ScriptTemplate>,
    workspace: WorkspaceConfig,
}

impl Optimizer {
    /// Subprocess engine and ASCII STL interchange, configured from `config`.
    pub fn from_config(config: OptimizerConfig) -> Self {
        Optimizer::new(SubprocessEngine::new(config.engine), StlCodec::ascii())
            .with_workspace_config(config.workspace)
    }
}

impl<E: MeshRepairEngine, C: MeshCodec> Optimizer<E, C> {
    /// Uses the bundled procedure and a default workspace config.
    pub fn new(engine: E, codec: C) -> Self {
        Self {
            engine,
            codec,
            template: bundled_template(),
            workspace: WorkspaceConfig::default(),
        }
    }

    pub fn with_template(mut self, template: Arc<ScriptTemplate>) -> Self {
        self.template = template;
        self
    }

    pub fn with_workspace_config(mut self, workspace: WorkspaceConfig) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn template(&self) -> &ScriptTemplate {
        &self.template
    }

    pub fn workspace_config(&self) -> &WorkspaceConfig {
        &self.workspace
    }

    /// Optimize and repair `solid`, returning a new solid.
    ///
    /// The workspace is removed whether or not the call succeeds.
    #[instrument(skip(self, solid), fields(engine = self.engine.name(), triangles = solid.triangle_count()))]
    pub fn optimize(
        &self,
        solid: &Solid,
        params: &OptimizationParameters,
    ) -> Result<Solid, OptimizeError> {
        params.validate()?;
        solid.validate()?;

        let workspace = ScopedWorkspace::acquire(&self.workspace, self.codec.extension())?;
        let result = self.run_in(&workspace, solid, params);

        // Cleanup failures are logged, not returned.
        if let Err(e) = workspace.release() {
            warn!(error = %e, "workspace cleanup failed");
        }

        let optimized = result?;
        info!(
            input_triangles = solid.triangle_count(),
            output_triangles = optimized.triangle_count(),
            "optimization finished"
        );
        Ok(optimized)
    }

    /// Like [`Optimizer::optimize`], with the solid scaled so that its
    /// smallest bounding-box dimension equals `size` while the engine runs.
    ///
    /// Edge lengths in `params` are interpreted at that canonical size.
    #[instrument(skip(self, solid, params))]
    pub fn optimize_scaled(
        &self,
        solid: &Solid,
        size: f64,
        params: &OptimizationParameters,
    ) -> Result<Solid, OptimizeError> {
        with_canonical_scale(solid, size, |normalized| {
            self.optimize(&normalized, params)
        })
    }

    fn run_in(
        &self,
        workspace: &ScopedWorkspace,
        solid: &Solid,
        params: &OptimizationParameters,
    ) -> Result<Solid, OptimizeError> {
        let mesh_path = workspace.mesh_path();
        self.codec.write_file(solid, mesh_path)?;

        let script = self.template.render(&params.bindings(mesh_path))?;
        debug!(bytes = script.len(), "script rendered");

        let outcome = self.engine.run(&script, workspace.dir())?;
        debug!(exit_code = ?outcome.exit_code, elapsed = ?outcome.elapsed, "engine returned");
        outcome.ensure_success()?;

        check_output(mesh_path)?;
        let optimized = self.codec.read_file(mesh_path)?;
        if optimized.is_empty() {
            return Err(EngineError::EmptyOutput {
                path: mesh_path.to_path_buf(),
            }
            .into());
        }
        Ok(optimized)
    }
}

fn check_output(path: &Path) -> Result<(), OptimizeError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(EngineError::EmptyOutput {
            path: path.to_path_buf(),
        }
        .into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(EngineError::MissingOutput {
            path: path.to_path_buf(),
        }
        .into()),
        Err(source) => Err(OptimizeError::Io {
            action: "inspect",
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn default_optimizer() -> Result<Optimizer, OptimizeError> {
    Ok(Optimizer::from_config(OptimizerConfig::from_env()?))
}

/// Optimize with the default engine, 10 adjustment iterations and a
/// 5 degree crease angle.
pub fn optimize(
    solid: &Solid,
    tolerance: f64,
    max_tolerance: f64,
    min_edge_length: f64,
    max_edge_length: f64,
) -> Result<Solid, OptimizeError> {
    let params =
        OptimizationParameters::new(tolerance, max_tolerance, min_edge_length, max_edge_length);
    default_optimizer()?.optimize(solid, &params)
}

#[allow(clippy::too_many_arguments)]
pub fn optimize_with(
    solid: &Solid,
    tolerance: f64,
    max_tolerance: f64,
    min_edge_length: f64,
    max_edge_length: f64,
    max_iterations: u32,
    crease_edge_angle: f64,
) -> Result<Solid, OptimizeError> {
    let params =
        OptimizationParameters::new(tolerance, max_tolerance, min_edge_length, max_edge_length)
            .with_max_iterations(max_iterations)
            .with_crease_edge_angle(crease_edge_angle);
    default_optimizer()?.optimize(solid, &params)
}

/// Scale-normalized [`optimize`].
pub fn optimize_scaled(
    solid: &Solid,
    size: f64,
    tolerance: f64,
    max_tolerance: f64,
    min_edge_length: f64,
    max_edge_length: f64,
) -> Result<Solid, OptimizeError> {
    let params =
        OptimizationParameters::new(tolerance, max_tolerance, min_edge_length, max_edge_length);
    default_optimizer()?.optimize_scaled(solid, size, &params)
}

#[allow(clippy::too_many_arguments)]
pub fn optimize_scaled_with(
    solid: &Solid,
    size: f64,
    tolerance: f64,
    max_tolerance: f64,
    min_edge_length: f64,
    max_edge_length: f64,
    max_iterations: u32,
    crease_edge_angle: f64,
) -> Result<Solid, OptimizeError> {
    let params =
        OptimizationParameters::new(tolerance, max_tolerance, min_edge_length, max_edge_length)
            .with_max_iterations(max_iterations)
            .with_crease_edge_angle(crease_edge_angle);
    default_optimizer()?.optimize_scaled(solid, size, &params)
}
