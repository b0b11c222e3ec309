//! Nonlinear solver (spec §4.9, component C9): damped Gauss-Newton
//! (Levenberg-Marquardt) over the packed parameter vector built by
//! `crate::residuals::ParamLayout`.

use std::collections::BTreeMap;

use crate::log::{SolveEvent, SolveLog};
use crate::residuals::{constraints as cres, reprojection, Dual, ParamLayout};
use crate::types::constraint::ConstraintKind;
use crate::types::ids::{CameraId, LineId, PointId};
use crate::types::{Constraint, Line, SolverOptions, Viewpoint, WorldPoint};

/// Residuals beyond this many pixels/units get down-weighted by a Huber
/// kernel when `SolverOptions.robust_kernel` is set, so a handful of
/// mismeasured points can't dominate the normal equations.
const ROBUST_HUBER_DELTA: f64 = 5.0;

/// Outcome of a solve, before being folded into the caller-facing
/// `SolveOutcome` (spec §4.9 "report final residual, iteration count,
/// converged flag").
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub converged: bool,
    pub cancelled: bool,
    pub iterations: u32,
    pub final_residual_norm: f64,
}

fn huber_weight(residual: f64) -> f64 {
    let a = residual.abs();
    if a <= ROBUST_HUBER_DELTA {
        1.0
    } else {
        ROBUST_HUBER_DELTA / a
    }
}

/// Build every residual (reprojection + enabled constraints) for the
/// current parameter vector `x`.
fn build_residuals(
    layout: &ParamLayout,
    x: &[f64],
    cameras: &BTreeMap<CameraId, Viewpoint>,
    points: &BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    constraints: &[Constraint],
    robust_kernel: bool,
) -> Vec<Dual> {
    let mut residuals = Vec::new();
    let xyz_of = |id: PointId| layout.point_xyz(id, x, &points[&id]);

    for (&camera_id, camera) in cameras {
        let rotation = layout.camera_rotation(camera_id, x);
        let position = layout.camera_position(camera_id, x);
        let intrinsics = layout.camera_intrinsics(camera_id, x, &camera.intrinsics);
        for ip in camera.image_points.iter().filter(|ip| ip.visible) {
            if !points.contains_key(&ip.world_point) {
                continue;
            }
            let point_xyz = xyz_of(ip.world_point);
            let [ru, rv] =
                reprojection::reprojection_residuals(&point_xyz, &rotation, &position, &intrinsics, ip.u, ip.v);
            residuals.push(ru);
            residuals.push(rv);
        }
    }

    for constraint in constraints.iter().filter(|c| c.enabled) {
        match &constraint.kind {
            ConstraintKind::FixedPoint { point, target } => {
                if points.contains_key(point) {
                    let p = xyz_of(*point);
                    residuals.extend(cres::fixed_point(&p, target.as_array()));
                }
            }
            ConstraintKind::Distance { point_a, point_b, target } => {
                if points.contains_key(point_a) && points.contains_key(point_b) {
                    let (a, b) = (xyz_of(*point_a), xyz_of(*point_b));
                    residuals.push(cres::distance(&a, &b, *target));
                }
            }
            ConstraintKind::Angle { point_a, vertex, point_c, target_degrees } => {
                if points.contains_key(point_a) && points.contains_key(vertex) && points.contains_key(point_c) {
                    let (a, v, c) = (xyz_of(*point_a), xyz_of(*vertex), xyz_of(*point_c));
                    residuals.push(cres::angle(&a, &v, &c, target_degrees.to_radians()));
                }
            }
            ConstraintKind::ParallelLines { line_a, line_b } => {
                if let (Some(la), Some(lb)) = (lines.get(line_a), lines.get(line_b)) {
                    let da = cres::line_direction(la, xyz_of);
                    let db = cres::line_direction(lb, xyz_of);
                    residuals.push(cres::parallel_lines(&da, &db));
                }
            }
            ConstraintKind::PerpendicularLines { line_a, line_b } => {
                if let (Some(la), Some(lb)) = (lines.get(line_a), lines.get(line_b)) {
                    let da = cres::line_direction(la, xyz_of);
                    let db = cres::line_direction(lb, xyz_of);
                    residuals.push(cres::perpendicular_lines(&da, &db));
                }
            }
            ConstraintKind::CollinearPoints { points: ids } => {
                if ids.iter().all(|id| points.contains_key(id)) {
                    let xs: Vec<_> = ids.iter().map(|&id| xyz_of(id)).collect();
                    residuals.extend(cres::collinear_points(&xs));
                }
            }
            ConstraintKind::CoplanarPoints { points: ids } => {
                if ids.iter().all(|id| points.contains_key(id)) {
                    let xs: Vec<_> = ids.iter().map(|&id| xyz_of(id)).collect();
                    residuals.extend(cres::coplanar_points(&xs));
                }
            }
            ConstraintKind::EqualDistances { pairs } => {
                if pairs.iter().all(|(a, b)| points.contains_key(a) && points.contains_key(b)) {
                    let dists: Vec<Dual> = pairs
                        .iter()
                        .map(|(a, b)| cres::distance(&xyz_of(*a), &xyz_of(*b), 0.0))
                        .collect();
                    residuals.extend(cres::equal_distances(&dists));
                }
            }
            ConstraintKind::EqualAngles { triplets } => {
                if triplets.iter().all(|(a, v, c)| points.contains_key(a) && points.contains_key(v) && points.contains_key(c)) {
                    let angles: Vec<Dual> = triplets
                        .iter()
                        .map(|(a, v, c)| cres::angle(&xyz_of(*a), &xyz_of(*v), &xyz_of(*c), 0.0))
                        .collect();
                    residuals.extend(cres::equal_angles(&angles));
                }
            }
        }
    }

    if robust_kernel {
        for r in &mut residuals {
            let w = huber_weight(r.value).sqrt();
            r.value *= w;
            for g in &mut r.grad {
                *g *= w;
            }
        }
    }

    residuals
}

fn residual_norm_sq(residuals: &[Dual]) -> f64 {
    residuals.iter().map(|r| r.value * r.value).sum()
}

fn apply_step(x: &[f64], delta: &[f64]) -> Vec<f64> {
    x.iter().zip(delta).map(|(&xi, &di)| xi + di).collect()
}

fn renormalize_quaternions(x: &mut [f64], layout: &ParamLayout) {
    for block in layout.cameras.values() {
        let [iw, ix, iy, iz] = block.rotation;
        let (w, qx, qy, qz) = (x[iw], x[ix], x[iy], x[iz]);
        let n = (w * w + qx * qx + qy * qy + qz * qz).sqrt();
        if n > 1e-12 {
            x[iw] = w / n;
            x[ix] = qx / n;
            x[iy] = qy / n;
            x[iz] = qz / n;
        }
    }
}

fn write_back(layout: &ParamLayout, x: &[f64], cameras: &mut BTreeMap<CameraId, Viewpoint>, points: &mut BTreeMap<PointId, WorldPoint>) {
    for (&id, block) in &layout.cameras {
        let camera = cameras.get_mut(&id).expect("camera present in layout must exist in working scene");
        camera.extrinsics.rotation.w = x[block.rotation[0]];
        camera.extrinsics.rotation.x = x[block.rotation[1]];
        camera.extrinsics.rotation.y = x[block.rotation[2]];
        camera.extrinsics.rotation.z = x[block.rotation[3]];
        camera.extrinsics.position = [x[block.position[0]], x[block.position[1]], x[block.position[2]]];
        if let Some(intr) = block.intrinsics {
            camera.intrinsics.focal_length = x[intr.focal_length];
            camera.intrinsics.principal_point = (x[intr.principal_point[0]], x[intr.principal_point[1]]);
            camera.intrinsics.radial = [x[intr.radial[0]], x[intr.radial[1]], x[intr.radial[2]]];
            camera.intrinsics.tangential = [x[intr.tangential[0]], x[intr.tangential[1]]];
        }
    }
    for (&id, axes) in &layout.points {
        let point = points.get_mut(&id).expect("point present in layout must exist in working scene");
        for axis in 0..3 {
            if let Some(idx) = axes[axis] {
                point.optimized_xyz[axis] = x[idx];
            }
        }
    }
}

/// Run the damped Gauss-Newton loop to convergence, the iteration cap, or
/// cancellation. Mutates `cameras`/`points` in place with the final
/// (possibly partial) result.
#[must_use]
pub fn solve(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    points: &mut BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    constraints: &[Constraint],
    options: &SolverOptions,
    log: &mut dyn SolveLog,
) -> SolveReport {
    let (layout, mut x) = ParamLayout::build(cameras, points, options.optimize_intrinsics);

    if layout.len == 0 {
        return SolveReport { converged: true, cancelled: false, iterations: 0, final_residual_norm: 0.0 };
    }

    let mut lambda = options.damping_initial;
    let mut residuals = build_residuals(&layout, &x, cameras, points, lines, constraints, options.robust_kernel);
    let mut current_norm_sq = residual_norm_sq(&residuals);
    let mut consecutive_numerical_failures = 0u32;
    let mut iterations_used = 0u32;
    let mut converged = false;
    let mut cancelled = false;

    for iteration in 0..options.max_iterations {
        iterations_used = iteration + 1;

        if options.is_aborted() {
            cancelled = true;
            log.record(SolveEvent::Cancelled { iterations: iterations_used });
            break;
        }

        let j: Vec<Vec<f64>> = residuals.iter().map(|r| r.grad.clone()).collect();
        let r: Vec<f64> = residuals.iter().map(|r| r.value).collect();
        let jtj = crate::linalg::gauss::ata(&j);
        let jtr = crate::linalg::gauss::atb(&j, &r);

        if jtr.iter().any(|v| !v.is_finite()) || jtj.iter().flatten().any(|v| !v.is_finite()) {
            consecutive_numerical_failures += 1;
            log::warn!("non-finite normal equations at iteration {iterations_used}, bumping damping");
            lambda = (lambda * 3.0).min(options.damping_max);
            if consecutive_numerical_failures >= 2 {
                log::warn!("giving up after {consecutive_numerical_failures} consecutive numerical failures");
                break;
            }
            continue;
        }
        consecutive_numerical_failures = 0;

        let mut damped = jtj.clone();
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] += lambda * jtj[i][i].max(1e-12);
        }
        let neg_jtr: Vec<f64> = jtr.iter().map(|v| -v).collect();

        let Some(delta) = crate::linalg::gauss::solve(&damped, &neg_jtr) else {
            lambda = (lambda * 2.0).min(options.damping_max);
            continue;
        };

        let delta_norm = delta.iter().map(|d| d * d).sum::<f64>().sqrt();
        let mut candidate_x = apply_step(&x, &delta);
        renormalize_quaternions(&mut candidate_x, &layout);

        let candidate_residuals = build_residuals(&layout, &candidate_x, cameras, points, lines, constraints, options.robust_kernel);
        let candidate_norm_sq = residual_norm_sq(&candidate_residuals);

        let accepted = candidate_norm_sq.is_finite() && candidate_norm_sq < current_norm_sq;
        log::trace!("iter {iterations_used}: |r|^2={current_norm_sq:.6e} -> {candidate_norm_sq:.6e} (lambda={lambda:.3e}, accepted={accepted})");
        log.record(SolveEvent::IterationSummary {
            iteration: iterations_used,
            residual_norm: current_norm_sq.sqrt(),
            damping: lambda,
            accepted,
        });

        if accepted {
            let relative_change = (current_norm_sq - candidate_norm_sq) / current_norm_sq.max(1e-300);
            x = candidate_x;
            residuals = candidate_residuals;
            current_norm_sq = candidate_norm_sq;
            lambda = (lambda * 0.5).max(options.damping_min);

            if delta_norm < options.tolerance || relative_change.abs() < options.tolerance {
                converged = true;
                iterations_used = iteration + 1;
                break;
            }
        } else {
            lambda = (lambda * 2.0).min(options.damping_max);
        }
    }

    write_back(&layout, &x, cameras, points);

    let final_residual_norm = current_norm_sq.sqrt();
    if converged {
        log.record(SolveEvent::Converged { iterations: iterations_used, final_residual: final_residual_norm });
    } else if !cancelled {
        log.record(SolveEvent::NotConverged { iterations: iterations_used, final_residual: final_residual_norm });
    }

    SolveReport { converged, cancelled, iterations: iterations_used, final_residual_norm }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::project::project;
    use crate::linalg::Quaternion;
    use crate::log::NullLog;
    use crate::types::camera::{Extrinsics, Intrinsics};
    use crate::types::ids::ConstraintId;
    use crate::types::{AxisMask, ImagePoint, ImagePointId};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn default_options() -> SolverOptions {
        SolverOptions {
            max_iterations: 200,
            tolerance: 1e-10,
            damping_initial: 1e-3,
            damping_min: 1e-10,
            damping_max: 1e8,
            optimize_intrinsics: false,
            robust_kernel: false,
            verbose: false,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn refines_a_perturbed_pose_toward_zero_reprojection_residual() {
        let intrinsics = Intrinsics::new(1000.0, (500.0, 500.0));
        let truth = Extrinsics { rotation: Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.1).normalize(), position: [0.1, 0.0, -5.0] };

        let mut vp = Viewpoint::new(CameraId::new(0), "cam", 1000, 1000);
        vp.intrinsics = intrinsics;
        vp.extrinsics = Extrinsics { rotation: Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.08).normalize(), position: [0.05, 0.0, -4.8] };

        let mut world_points = BTreeMap::new();
        let coords: [[f64; 3]; 6] = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.5, 0.5, 1.0],
            [-0.5, 0.2, -0.3],
        ];
        for (i, c) in coords.iter().enumerate() {
            let id = PointId::new(i as u32);
            let point = WorldPoint::new(id, format!("p{i}")).with_locked(0, c[0]).with_locked(1, c[1]).with_locked(2, c[2]);
            world_points.insert(id, point);
            let (u, v) = project(c, &intrinsics, &truth).unwrap();
            vp.image_points.push(ImagePoint::new(ImagePointId::new(i as u32), id, u, v));
        }

        let mut cameras = BTreeMap::new();
        cameras.insert(CameraId::new(0), vp);
        let lines: BTreeMap<LineId, Line> = BTreeMap::new();
        let constraints: Vec<Constraint> = Vec::new();

        let mut log = NullLog;
        let report = solve(&mut cameras, &mut world_points, &lines, &constraints, &default_options(), &mut log);

        assert!(report.converged || report.final_residual_norm < 1e-3);
        assert!(report.final_residual_norm < 1.0);
    }

    #[test]
    fn fixed_point_constraint_pulls_a_free_point_toward_its_target() {
        let mut world_points = BTreeMap::new();
        let id = PointId::new(0);
        let mut point = WorldPoint::new(id, "p");
        point.optimized_xyz = [1.0, 1.0, 1.0];
        world_points.insert(id, point);

        let cameras: BTreeMap<CameraId, Viewpoint> = BTreeMap::new();
        let lines: BTreeMap<LineId, Line> = BTreeMap::new();
        let constraints = vec![Constraint::new(
            ConstraintId::new(0),
            ConstraintKind::FixedPoint { point: id, target: AxisMask { x: Some(0.0), y: Some(0.0), z: Some(0.0) } },
        )];

        let mut cameras = cameras;
        let mut log = NullLog;
        let report = solve(&mut cameras, &mut world_points, &lines, &constraints, &default_options(), &mut log);

        assert!(report.converged);
        let xyz = world_points[&id].optimized_xyz;
        for v in xyz {
            assert!(v.abs() < 1e-6);
        }
    }
}
