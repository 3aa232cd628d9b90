mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use mesh_io::{CodecError, StlCodec};
use mesh_optimizer::{
    OptimizationParameters, OptimizeError, Optimizer, ScriptTemplate, TemplateError,
    WorkspaceConfig,
};
use mesh_types::primitives::{cube, cube_minus_sphere, cuboid};
use mesh_types::{MeshError, Solid};
use repair_engine::{EngineError, MeshRepairEngine, MockBehavior, MockEngine, ProcessResult};

use common::{optimizer_in, workspace_in, TestDir};

fn params() -> OptimizationParameters {
    OptimizationParameters::new(1e-6, 1e-4, 1.0, 2.0)
}

/// Shifts every vertex by a fraction of `max_tolerance`, the way a real
/// double-removal pass nudges merged vertices.
fn nudging_engine() -> MockEngine {
    MockEngine::transform(|s| s.translated([5e-5, -5e-5, 0.0]))
}

// ── Basic pipeline ─────────────────────────────────────────────────────────

#[test]
fn cube_minus_sphere_stays_within_max_tolerance() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, nudging_engine());
    let solid = cube_minus_sphere(1.0, 0.3, 24).unwrap();

    let out = optimizer.optimize(&solid, &params()).unwrap();

    let deviation = out.bounding_box().max_deviation(&solid.bounding_box());
    assert!(deviation <= params().max_tolerance, "deviation {deviation}");
    assert_eq!(out.triangle_count(), solid.triangle_count());
    assert_eq!(optimizer.engine().call_count(), 1);
    assert!(dir.entries().is_empty(), "leftover: {:?}", dir.entries());
}

#[test]
fn input_solid_is_not_modified() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::transform(|s| s.scaled(2.0)));
    let solid = cube(1.0);
    let before = solid.clone();

    let out = optimizer.optimize(&solid, &params()).unwrap();

    assert_eq!(solid, before);
    assert_eq!(out.bounding_box().size(), [2.0, 2.0, 2.0]);
}

#[test]
fn rerun_on_output_does_not_drift() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, nudging_engine());
    let solid = cube_minus_sphere(2.0, 0.6, 16).unwrap();

    let once = optimizer.optimize(&solid, &params()).unwrap();
    let twice = optimizer.optimize(&once, &params()).unwrap();

    let drift = twice.bounding_box().max_deviation(&once.bounding_box());
    assert!(drift <= params().max_tolerance, "drift {drift}");
    assert_eq!(twice.triangle_count(), once.triangle_count());
}

#[test]
fn rendered_script_has_every_value_bound() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());
    let p = params().with_max_iterations(25).with_crease_edge_angle(12.5);

    optimizer.optimize(&cube(1.0), &p).unwrap();

    let calls = optimizer.engine().calls();
    let script = &calls[0].script;
    assert!(ScriptTemplate::new(script.as_str()).placeholders().is_empty());

    let mesh_path = calls[0].working_dir.join("csg.stl");
    assert!(mesh_path.is_absolute());
    assert!(script.contains(&format!("= \"{}\"", mesh_path.display())));
    for expected in [
        "removeDoublesTol   = 1e-6",
        "creaseEdgeAngle    = 12.5",
        "resolveTol         = 0.0001",
        "minEdgeLength      = 1\n",
        "maxEdgeLength      = 2\n",
        "maxAdjIterations   = 25\n",
    ] {
        assert!(script.contains(expected), "missing {expected:?} in:\n{script}");
    }
}

#[test]
fn engine_sees_the_written_solid() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());
    let solid = cuboid([1.0, 2.0, 3.0], [1.5, 4.0, 3.25]);

    optimizer.optimize(&solid, &params()).unwrap();

    let calls = optimizer.engine().calls();
    let seen = calls[0].input.as_ref().unwrap();
    let expected: Vec<_> = solid.triangle_corners().collect();
    assert_eq!(seen.triangle_corners().collect::<Vec<_>>(), expected);
}

// ── Concurrency ────────────────────────────────────────────────────────────

#[test]
fn concurrent_calls_use_distinct_workspaces() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(
        &dir,
        MockEngine::passthrough().with_delay(Duration::from_millis(150)),
    );
    let a = cube(1.0);
    let b = cube(3.0);

    let (out_a, out_b) = thread::scope(|scope| {
        let ha = scope.spawn(|| optimizer.optimize(&a, &params()));
        let hb = scope.spawn(|| optimizer.optimize(&b, &params()));
        (ha.join().unwrap(), hb.join().unwrap())
    });

    assert_eq!(out_a.unwrap().bounding_box().size(), [1.0; 3]);
    assert_eq!(out_b.unwrap().bounding_box().size(), [3.0; 3]);

    let calls = optimizer.engine().calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].working_dir, calls[1].working_dir);
    for call in &calls {
        assert!(!call.working_dir.exists());
    }
    assert!(dir.entries().is_empty());
}

// ── Failure paths release the workspace ────────────────────────────────────

fn assert_released(dir: &TestDir, optimizer: &Optimizer<MockEngine, StlCodec>) {
    for call in optimizer.engine().calls() {
        assert!(!call.working_dir.exists(), "{} still exists", call.working_dir.display());
    }
    assert!(dir.entries().is_empty(), "leftover: {:?}", dir.entries());
}

#[test]
fn non_zero_exit_is_process_failure() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::failing(3));

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    match err {
        OptimizeError::ProcessFailure(EngineError::NonZeroExit { code, output }) => {
            assert_eq!(code, 3);
            assert!(!output.is_empty());
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
    assert_released(&dir, &optimizer);
}

#[test]
fn killed_engine_is_process_failure() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::new(MockBehavior::Terminated));

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    assert!(matches!(
        err,
        OptimizeError::ProcessFailure(EngineError::Terminated { .. })
    ));
    assert_released(&dir, &optimizer);
}

#[test]
fn timeout_is_process_failure() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::new(MockBehavior::Timeout));

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    assert!(matches!(
        err,
        OptimizeError::ProcessFailure(EngineError::Timeout { .. })
    ));
    assert_released(&dir, &optimizer);
}

#[test]
fn deleted_output_is_process_failure() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::new(MockBehavior::DeleteOutput));

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    match err {
        OptimizeError::ProcessFailure(EngineError::MissingOutput { path }) => {
            assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("csg.stl"));
        }
        other => panic!("expected MissingOutput, got {other:?}"),
    }
    assert_released(&dir, &optimizer);
}

/// Engine that replaces the mesh file with fixed bytes.
struct OverwritingEngine(&'static [u8]);

impl MeshRepairEngine for OverwritingEngine {
    fn name(&self) -> &str {
        "overwriting"
    }

    fn run(&self, _script: &str, working_dir: &Path) -> Result<ProcessResult, EngineError> {
        fs::write(working_dir.join("csg.stl"), self.0).unwrap();
        Ok(ProcessResult {
            exit_code: Some(0),
            output: String::new(),
            elapsed: Duration::ZERO,
        })
    }
}

fn overwriting_optimizer(dir: &TestDir, bytes: &'static [u8]) -> Optimizer<OverwritingEngine> {
    Optimizer::new(OverwritingEngine(bytes), StlCodec::ascii())
        .with_workspace_config(workspace_in(dir))
}

#[test]
fn empty_output_file_is_process_failure() {
    let dir = TestDir::new();
    let optimizer = overwriting_optimizer(&dir, b"");

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    assert!(matches!(
        err,
        OptimizeError::ProcessFailure(EngineError::EmptyOutput { .. })
    ));
    assert!(dir.entries().is_empty());
}

#[test]
fn output_without_triangles_is_process_failure() {
    let dir = TestDir::new();
    let optimizer = overwriting_optimizer(&dir, b"solid csg\nendsolid csg\n");

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    assert!(matches!(
        err,
        OptimizeError::ProcessFailure(EngineError::EmptyOutput { .. })
    ));
}

#[test]
fn unreadable_output_is_codec_error() {
    let dir = TestDir::new();
    let optimizer = overwriting_optimizer(
        &dir,
        b"solid csg\n  facet normal 0 0 1\n    outer loop\n      vertex 0 0 zero\n",
    );

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    assert!(matches!(err, OptimizeError::Codec(CodecError::Parse { .. })), "{err:?}");
    assert!(dir.entries().is_empty());
}

// ── Validation happens before any work ─────────────────────────────────────

#[test]
fn invalid_parameters_never_reach_the_engine() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());
    let bad = OptimizationParameters::new(1e-6, 1e-4, 3.0, 2.0);

    let err = optimizer.optimize(&cube(1.0), &bad).unwrap_err();

    assert!(matches!(err, OptimizeError::InvalidParameters { .. }));
    assert_eq!(optimizer.engine().call_count(), 0);
    assert!(dir.entries().is_empty());
}

#[test]
fn non_finite_solid_never_reaches_the_engine() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());
    let solid = cuboid([0.0, 0.0, 0.0], [1.0, f64::NAN, 1.0]);

    let err = optimizer.optimize(&solid, &params()).unwrap_err();

    assert!(matches!(
        err,
        OptimizeError::InvalidSolid(MeshError::NonFiniteVertex { .. })
    ));
    assert_eq!(optimizer.engine().call_count(), 0);
    assert!(dir.entries().is_empty());
}

#[test]
fn unbound_placeholder_in_custom_template() {
    let dir = TestDir::new();
    let template = ScriptTemplate::new("load $filename$ with $smoothingKnob$");
    let optimizer =
        optimizer_in(&dir, MockEngine::passthrough()).with_template(Arc::new(template));

    let err = optimizer.optimize(&cube(1.0), &params()).unwrap_err();

    match err {
        OptimizeError::TemplateBinding(TemplateError::Unbound { names }) => {
            assert_eq!(names, vec!["smoothingKnob".to_string()]);
        }
        other => panic!("expected TemplateBinding, got {other:?}"),
    }
    assert_eq!(optimizer.engine().call_count(), 0);
    assert!(dir.entries().is_empty());
}

#[test]
fn empty_solid_cannot_be_written() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());

    let err = optimizer.optimize(&Solid::default(), &params()).unwrap_err();

    assert!(matches!(err, OptimizeError::Codec(CodecError::EmptyMesh)));
    assert!(dir.entries().is_empty());
}

// ── Workspace retention ────────────────────────────────────────────────────

#[test]
fn retained_workspace_survives_the_call() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough()).with_workspace_config(
        WorkspaceConfig {
            retain: true,
            prefix: "kept".to_string(),
            ..workspace_in(&dir)
        },
    );

    optimizer.optimize(&cube(1.0), &params()).unwrap();

    let calls = optimizer.engine().calls();
    let kept = &calls[0].working_dir;
    assert!(kept.join("csg.stl").is_file());
    let entries = dir.entries();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("kept-"));
}

// ── Scale normalization ────────────────────────────────────────────────────

#[test]
fn engine_receives_normalized_solid() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());
    let solid = cuboid([2.0, 2.0, 2.0], [2.5, 3.0, 4.0]);

    let out = optimizer.optimize_scaled(&solid, 10.0, &params()).unwrap();

    let calls = optimizer.engine().calls();
    let seen = calls[0].input.as_ref().unwrap().bounding_box();
    assert_relative_eq!(seen.min_dimension(), 10.0, epsilon = 1e-9);
    // Scaled about the origin, not the box center.
    assert_relative_eq!(seen.min[0], 40.0, epsilon = 1e-9);

    let bb = out.bounding_box();
    assert_relative_eq!(bb.min_dimension(), 0.5, epsilon = 1e-12);
    assert!(bb.max_deviation(&solid.bounding_box()) <= 1e-12);
}

#[test]
fn degenerate_solid_is_rejected_before_the_engine_runs() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());
    let flat = cuboid([0.0, 0.0, 0.0], [3.0, 2.0, 0.0]);

    let err = optimizer.optimize_scaled(&flat, 10.0, &params()).unwrap_err();

    match err {
        OptimizeError::DegenerateGeometry { size } => assert_eq!(size, 0.0),
        other => panic!("expected DegenerateGeometry, got {other:?}"),
    }
    assert_eq!(optimizer.engine().call_count(), 0);
    assert!(dir.entries().is_empty());
}

#[test]
fn non_positive_canonical_size_is_rejected() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::passthrough());

    let err = optimizer.optimize_scaled(&cube(1.0), -1.0, &params()).unwrap_err();

    assert!(matches!(err, OptimizeError::InvalidScale { size } if size == -1.0));
    assert_eq!(optimizer.engine().call_count(), 0);
}

/// Splits every triangle that has an edge longer than `limit` into four,
/// until none is left. Mimics an engine whose output density depends on
/// absolute edge lengths.
fn subdivide_long_edges(solid: &Solid, limit: f64) -> Solid {
    let mut soup: Vec<[[f64; 3]; 3]> = solid.triangle_corners().collect();
    for _ in 0..8 {
        let mut next = Vec::with_capacity(soup.len() * 4);
        let mut split_any = false;
        for [a, b, c] in soup {
            let longest = [(a, b), (b, c), (c, a)]
                .iter()
                .map(|(p, q)| distance(p, q))
                .fold(0.0, f64::max);
            if longest <= limit {
                next.push([a, b, c]);
                continue;
            }
            split_any = true;
            let (ab, bc, ca) = (midpoint(&a, &b), midpoint(&b, &c), midpoint(&c, &a));
            next.extend([[a, ab, ca], [ab, b, bc], [ca, bc, c], [ab, bc, ca]]);
        }
        soup = next;
        if !split_any {
            break;
        }
    }
    Solid::from_triangle_soup(soup).unwrap()
}

fn distance(p: &[f64; 3], q: &[f64; 3]) -> f64 {
    ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2) + (p[2] - q[2]).powi(2)).sqrt()
}

fn midpoint(p: &[f64; 3], q: &[f64; 3]) -> [f64; 3] {
    [(p[0] + q[0]) / 2.0, (p[1] + q[1]) / 2.0, (p[2] + q[2]) / 2.0]
}

#[test]
fn scaled_optimize_is_scale_invariant() {
    let dir = TestDir::new();
    let optimizer = optimizer_in(&dir, MockEngine::transform(|s| subdivide_long_edges(s, 2.0)));

    let small = optimizer.optimize_scaled(&cube(1.0), 10.0, &params()).unwrap();
    let large = optimizer.optimize_scaled(&cube(100.0), 10.0, &params()).unwrap();

    assert!(small.triangle_count() > 12);
    assert_eq!(small.triangle_count(), large.triangle_count());
    let (s, l) = (small.edge_stats().unwrap(), large.edge_stats().unwrap());
    assert_eq!(s.count, l.count);
    assert_relative_eq!(l.max, s.max * 100.0, max_relative = 1e-9);
    assert_relative_eq!(l.mean, s.mean * 100.0, max_relative = 1e-9);
    assert_relative_eq!(small.bounding_box().min_dimension(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(large.bounding_box().min_dimension(), 100.0, epsilon = 1e-7);

    // Without normalization the density follows the input units.
    let raw = optimizer.optimize(&cube(1.0), &params()).unwrap();
    assert_eq!(raw.triangle_count(), 12);
}
