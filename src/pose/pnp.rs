//! Iterative Perspective-n-Point: recover one camera's extrinsics from >= 3
//! known world points and their pixel observations (spec §4.4, and the
//! late-PnP step of the orchestrator's iterative variant, spec §4.6).
//!
//! A small Levenberg-Marquardt loop over a 6-parameter pose delta (a
//! rotation vector plus a translation), independent of the general
//! bundle-adjustment solver in `crate::solver` — this one only ever touches
//! a single camera's pose with the world held fixed.

use crate::geometry::project::project;
use crate::linalg::gauss;
use crate::linalg::mat3::Vec3;
use crate::linalg::Quaternion;
use crate::types::camera::{Extrinsics, Intrinsics};

/// One world point plus its pixel observation in the camera being solved.
#[derive(Debug, Clone, Copy)]
pub struct PnpObservation {
    pub point: Vec3,
    pub pixel: (f64, f64),
}

#[derive(Debug, Clone, Copy)]
pub struct PnpResult {
    pub extrinsics: Extrinsics,
    pub mean_reprojection_error: f64,
    pub reliable: bool,
}

const MAX_ITERATIONS: u32 = 50;
const NUMERICAL_STEP: f64 = 1e-6;
const BEHIND_CAMERA_PENALTY: f64 = 1_000.0;
const RELIABLE_ERROR_PX: f64 = 10.0;

fn residuals(observations: &[PnpObservation], intrinsics: &Intrinsics, extrinsics: &Extrinsics) -> Vec<f64> {
    let mut out = Vec::with_capacity(observations.len() * 2);
    for obs in observations {
        match project(&obs.point, intrinsics, extrinsics) {
            Some((u, v)) => {
                out.push(u - obs.pixel.0);
                out.push(v - obs.pixel.1);
            }
            None => {
                out.push(BEHIND_CAMERA_PENALTY);
                out.push(BEHIND_CAMERA_PENALTY);
            }
        }
    }
    out
}

fn cost(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// Apply a 6-vector pose delta: `delta[0..3]` is a rotation vector
/// (axis-angle, applied as a left-multiply in camera/world-alignment
/// space), `delta[3..6]` is a translation added to the position.
fn apply_delta(extrinsics: &Extrinsics, delta: &[f64]) -> Extrinsics {
    let angle = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
    let rotation = if angle < 1e-12 {
        extrinsics.rotation
    } else {
        let axis = [delta[0] / angle, delta[1] / angle, delta[2] / angle];
        Quaternion::from_axis_angle(axis, angle).multiply(extrinsics.rotation).normalize()
    };
    let position = [
        extrinsics.position[0] + delta[3],
        extrinsics.position[1] + delta[4],
        extrinsics.position[2] + delta[5],
    ];
    Extrinsics { rotation, position }
}

/// Numerical (central-difference) Jacobian of the stacked residual vector
/// with respect to the 6-parameter pose delta, evaluated at `delta = 0`.
fn jacobian(observations: &[PnpObservation], intrinsics: &Intrinsics, extrinsics: &Extrinsics) -> Vec<Vec<f64>> {
    let n = observations.len() * 2;
    let mut cols = Vec::with_capacity(6);
    for p in 0..6 {
        let mut plus = [0.0; 6];
        plus[p] = NUMERICAL_STEP;
        let mut minus = [0.0; 6];
        minus[p] = -NUMERICAL_STEP;

        let r_plus = residuals(observations, intrinsics, &apply_delta(extrinsics, &plus));
        let r_minus = residuals(observations, intrinsics, &apply_delta(extrinsics, &minus));

        let col: Vec<f64> = (0..n).map(|i| (r_plus[i] - r_minus[i]) / (2.0 * NUMERICAL_STEP)).collect();
        cols.push(col);
    }
    // transpose cols (6 x n) into rows (n x 6)
    let mut rows = vec![vec![0.0; 6]; n];
    for (c, col) in cols.iter().enumerate() {
        for (r, &v) in col.iter().enumerate() {
            rows[r][c] = v;
        }
    }
    rows
}

/// Run Levenberg-Marquardt starting from `initial`, returning the refined
/// pose plus a reliability verdict (spec §4.4: "PnP ... with reliability
/// criteria" — here, mean reprojection error under 10px and the majority of
/// points landing in front of the camera).
#[must_use]
pub fn solve_pnp_iterative(observations: &[PnpObservation], intrinsics: &Intrinsics, initial: Extrinsics) -> Option<PnpResult> {
    if observations.len() < 3 {
        return None;
    }

    let mut extrinsics = initial;
    let mut lambda = 1e-3;
    let mut current_residuals = residuals(observations, intrinsics, &extrinsics);
    let mut current_cost = cost(&current_residuals);

    for _ in 0..MAX_ITERATIONS {
        let jac = jacobian(observations, intrinsics, &extrinsics);
        let jtj = gauss::ata(&jac);
        let jtr = gauss::atb(&jac, &current_residuals);

        let mut accepted = false;
        for _ in 0..10 {
            let mut damped = jtj.clone();
            for i in 0..6 {
                damped[i][i] *= 1.0 + lambda;
            }
            let Some(delta) = gauss::solve(&damped, &jtr) else {
                lambda *= 10.0;
                continue;
            };
            // normal equations solve J^T J dx = J^T r minimizes 0.5||r+J dx||^2,
            // so the step that reduces cost is -dx.
            let step: Vec<f64> = delta.iter().map(|v| -v).collect();
            let candidate = apply_delta(&extrinsics, &step);
            let candidate_residuals = residuals(observations, intrinsics, &candidate);
            let candidate_cost = cost(&candidate_residuals);

            if candidate_cost < current_cost {
                extrinsics = candidate;
                current_residuals = candidate_residuals;
                current_cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-10);
                accepted = true;
                break;
            }
            lambda = (lambda * 10.0).min(1e10);
        }

        if !accepted {
            break;
        }
        if current_cost.sqrt() < 1e-9 {
            break;
        }
    }

    let mean_error = (current_cost / observations.len() as f64).sqrt();
    let in_front = observations
        .iter()
        .filter(|obs| project(&obs.point, intrinsics, &extrinsics).is_some())
        .count();
    let reliable = mean_error < RELIABLE_ERROR_PX && in_front * 2 >= observations.len();

    Some(PnpResult { extrinsics, mean_reprojection_error: mean_error, reliable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::mat3::sub3;

    fn synthetic_observations(extrinsics: &Extrinsics, intrinsics: &Intrinsics, points: &[Vec3]) -> Vec<PnpObservation> {
        points
            .iter()
            .map(|p| PnpObservation { point: *p, pixel: project(p, intrinsics, extrinsics).unwrap() })
            .collect()
    }

    #[test]
    fn recovers_a_nearby_known_pose() {
        let intrinsics = Intrinsics::new(1000.0, (500.0, 500.0));
        let true_extrinsics = Extrinsics {
            rotation: Quaternion::from_axis_angle([0.1, 0.8, 0.2], 0.3).normalize(),
            position: [1.0, -0.5, -8.0],
        };
        let points: [Vec3; 6] = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.5, 0.5, 1.0],
            [-0.5, 0.3, -0.5],
        ];
        let observations = synthetic_observations(&true_extrinsics, &intrinsics, &points);

        let initial = Extrinsics { rotation: Quaternion::identity(), position: [0.0, 0.0, -7.0] };
        let result = solve_pnp_iterative(&observations, &intrinsics, initial).unwrap();

        assert!(result.reliable);
        assert!(result.mean_reprojection_error < 1.0);
        let pos_err = distance3(&result.extrinsics.position, &true_extrinsics.position);
        assert!(pos_err < 0.1, "position error too large: {pos_err}");
    }

    fn distance3(a: &Vec3, b: &Vec3) -> f64 {
        let d = sub3(a, b);
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    }

    #[test]
    fn fewer_than_three_points_refuses_to_solve() {
        let intrinsics = Intrinsics::new(1000.0, (500.0, 500.0));
        let extrinsics = Extrinsics::identity();
        let obs = vec![
            PnpObservation { point: [0.0, 0.0, 5.0], pixel: (500.0, 500.0) },
            PnpObservation { point: [1.0, 0.0, 5.0], pixel: (600.0, 500.0) },
        ];
        let _ = intrinsics;
        let _ = extrinsics;
        assert!(solve_pnp_iterative(&obs, &Intrinsics::new(1000.0, (500.0, 500.0)), Extrinsics::identity()).is_none());
    }
}
