//! Top-level solve session (spec §6): the single entry point wiring
//! vanishing-point/pose/strategy init (C3–C5, reached through
//! `crate::orchestrator`), frame alignment (C7), the residual/solver engine
//! (C8–C9), and diagnostics (C10) around one immutable input `Scene`.

use std::collections::BTreeMap;

use crate::alignment;
use crate::diagnostics::{self, ConstraintResidual};
use crate::error::Error;
use crate::geometry::project::project;
use crate::log::{NullLog, RecordingLog, SolveEvent, SolveLog};
use crate::orchestrator;
use crate::solver;
use crate::strategy::RELIABLE_REPROJECTION_ERROR_PX;
use crate::types::ids::{CameraId, PointId};
use crate::types::{Line, Scene, SolverOptions, Viewpoint, WorldPoint};

/// Everything the spec's output `diagnostics` record names (spec §6), plus
/// `fatal` for the cases the core rejects outright rather than returning a
/// degraded result.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub converged: bool,
    pub cancelled: bool,
    pub iterations: u32,
    pub final_residual: f64,
    pub per_camera_strategy: BTreeMap<CameraId, String>,
    pub alignment_quality: f64,
    pub used_essential_matrix: bool,
    pub stepped_vp_reverted: bool,
    pub vp_em_hybrid_applied: bool,
    pub unreliable_cameras: Vec<CameraId>,
    pub isolated_points: Vec<PointId>,
    pub constraint_residuals: Vec<ConstraintResidual>,
    pub degrees_of_freedom: i64,
    pub fatal: Option<Error>,
}

/// Full solve output: updated scene state plus diagnostics and, when
/// `options.verbose`, the ordered textual event log (spec §6).
#[derive(Debug, Clone, Default)]
pub struct SolveOutcome {
    pub cameras: BTreeMap<CameraId, Viewpoint>,
    pub world_points: BTreeMap<PointId, WorldPoint>,
    pub diagnostics: Diagnostics,
    pub log: Vec<String>,
}

fn fatal_outcome(scene: &Scene, error: Error) -> SolveOutcome {
    SolveOutcome {
        cameras: scene.cameras.clone(),
        world_points: scene.world_points.clone(),
        diagnostics: Diagnostics { fatal: Some(error), ..Diagnostics::default() },
        log: Vec::new(),
    }
}

/// Propagate axis-aligned `Line` direction constraints between their
/// endpoints (spec §3 "two points joined by an x-aligned line inherit Y and
/// Z from each other"), to a fixed point — a chain of aligned lines can
/// cascade a single lock across several points. Runs before initialization
/// so `fully_constrained`/`anchored` see every point's true constraint
/// state.
fn infer_from_lines(world_points: &mut BTreeMap<PointId, WorldPoint>, lines: &BTreeMap<crate::types::ids::LineId, Line>) {
    let max_passes = lines.len() + world_points.len() + 1;
    for _ in 0..max_passes {
        let mut changed = false;
        for line in lines.values() {
            let Some(axis) = line.direction.vp_axis() else { continue };
            if line.point_a == line.point_b {
                continue;
            }
            for other in (0..3).filter(|&a| a != axis.index()) {
                let a_val = world_points.get(&line.point_a).and_then(|p| p.effective_xyz()[other]);
                let b_val = world_points.get(&line.point_b).and_then(|p| p.effective_xyz()[other]);
                match (a_val, b_val) {
                    (Some(v), None) => {
                        if let Some(p) = world_points.get_mut(&line.point_b) {
                            p.set_inferred(other, v);
                            changed = true;
                        }
                    }
                    (None, Some(v)) => {
                        if let Some(p) = world_points.get_mut(&line.point_a) {
                            p.set_inferred(other, v);
                            changed = true;
                        }
                    }
                    _ => {}
                }
            }
        }
        if !changed {
            break;
        }
    }
}

/// Mean reprojection error, in pixels, of every visible observation a
/// camera has of a point with a known position — `None` when the camera has
/// no such observation to judge by.
fn mean_reprojection_error(camera: &Viewpoint, world_points: &BTreeMap<PointId, WorldPoint>) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for ip in camera.image_points.iter().filter(|ip| ip.visible) {
        let Some(point) = world_points.get(&ip.world_point) else { continue };
        let xyz = point.effective_or_optimized();
        let Some((u, v)) = project(&xyz, &camera.intrinsics, &camera.extrinsics) else {
            continue;
        };
        total += ((u - ip.u).powi(2) + (v - ip.v).powi(2)).sqrt();
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

fn unreliable_cameras(cameras: &BTreeMap<CameraId, Viewpoint>, world_points: &BTreeMap<PointId, WorldPoint>) -> Vec<CameraId> {
    cameras
        .iter()
        .filter(|(_, camera)| mean_reprojection_error(camera, world_points).is_some_and(|e| e > RELIABLE_REPROJECTION_ERROR_PX))
        .map(|(&id, _)| id)
        .collect()
}

/// Run the full pipeline against a read-only `Scene` snapshot: validate,
/// infer, initialize, align, solve, and diagnose. Never panics on bad
/// input — structural problems and unsolvable scenes come back as
/// `diagnostics.fatal` rather than an error return, so the caller always
/// gets a `SolveOutcome` to inspect.
#[must_use]
pub fn solve(scene: &Scene, options: &SolverOptions) -> SolveOutcome {
    if let Err(reason) = scene.validate() {
        return fatal_outcome(scene, Error::InvalidScene(reason));
    }

    let mut cameras = scene.cameras.clone();
    let mut world_points = scene.world_points.clone();
    let lines = scene.lines.clone();
    let constraints = scene.constraints.clone();

    if let Err(e) = diagnostics::check_before_solve(&cameras, &constraints) {
        return fatal_outcome(scene, e);
    }

    infer_from_lines(&mut world_points, &lines);

    let orchestration = orchestrator::run(&mut cameras, &mut world_points, &lines);

    if !orchestration.cameras_failed.is_empty() {
        let camera = orchestration.cameras_failed[0];
        let name = cameras.get(&camera).map_or_else(|| camera.to_string(), |c| c.name.clone());
        return fatal_outcome(
            scene,
            Error::InitializationFailed {
                camera: name,
                last_strategy: "late-pnp".into(),
                reason: "no initialization strategy produced a usable pose".into(),
            },
        );
    }

    let alignment_report = alignment::align(&mut cameras, &mut world_points, &lines, &constraints);

    let mut recording = RecordingLog::new();
    let mut null_log = NullLog;
    let log: &mut dyn SolveLog = if options.verbose { &mut recording } else { &mut null_log };
    let report = solver::solve(&mut cameras, &mut world_points, &lines, &constraints, options, log);

    let constraint_residuals = diagnostics::evaluate_constraint_residuals(&world_points, &lines, &constraints);
    let isolated_points = diagnostics::isolated_points(&world_points, &constraints);
    let dof = diagnostics::degrees_of_freedom(&world_points, &cameras, &constraints);
    let unreliable = unreliable_cameras(&cameras, &world_points);

    if options.verbose {
        recording.record(SolveEvent::Message(format!("degrees of freedom: {dof}")));
    }

    let per_camera_strategy = orchestration.strategy_per_camera.iter().map(|(&id, &s)| (id, s.to_string())).collect();

    SolveOutcome {
        cameras,
        world_points,
        diagnostics: Diagnostics {
            converged: report.converged,
            cancelled: report.cancelled,
            iterations: report.iterations,
            final_residual: report.final_residual_norm,
            per_camera_strategy,
            alignment_quality: alignment_report.alignment_quality,
            used_essential_matrix: orchestration.used_essential_matrix,
            stepped_vp_reverted: orchestration.stepped_vp_reverted,
            vp_em_hybrid_applied: orchestration.vp_em_hybrid_applied,
            unreliable_cameras: unreliable,
            isolated_points,
            constraint_residuals,
            degrees_of_freedom: dof,
            fatal: None,
        },
        log: recording.to_text(),
    }
}
