//! Sign-combination search over the even-parity axis-flip subgroup (spec
//! §4.4): the closed-form VP/rotation solvers above leave a residual
//! handedness ambiguity that isn't resolved by chirality selection alone,
//! so every accepted candidate pose is additionally tried against the four
//! sign flips that preserve a right-handed frame, scored by how many
//! points end up in front of the camera and how well they reproject.

use crate::geometry::project::project;
use crate::linalg::mat3::Vec3;
use crate::linalg::Quaternion;
use crate::types::camera::{Extrinsics, Intrinsics};

/// The four diagonal sign matrices of determinant +1: identity and the
/// three 180-degree flips about a coordinate axis pair.
const EVEN_PARITY_FLIPS: [[f64; 3]; 4] = [
    [1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
];

const IN_FRONT_WEIGHT: f64 = 1_000_000.0;
const MAX_MEAN_REPROJECTION_ERROR_PX: f64 = 50.0;

/// A candidate pose together with the points used to score it (world
/// points with a known pixel observation in this camera).
#[derive(Debug, Clone, Copy)]
pub struct ScoredPoint {
    pub world_point: Vec3,
    pub pixel: (f64, f64),
}

/// Apply one axis-flip to a rotation by conjugating its matrix with the
/// diagonal sign matrix `diag(s)`: `R' = S R S` (S is its own inverse).
fn apply_flip(rotation: Quaternion, signs: [f64; 3]) -> Quaternion {
    let m = rotation.to_rotation_matrix();
    let mut flipped = m;
    for i in 0..3 {
        for j in 0..3 {
            flipped[i][j] = signs[i] * m[i][j] * signs[j];
        }
    }
    Quaternion::from_rotation_matrix(&flipped)
}

/// Score one candidate extrinsics: `1e6` per point in front of the camera,
/// minus the sum of squared reprojection error for points with a known
/// pixel observation. Higher is better.
fn score(extrinsics: &Extrinsics, intrinsics: &Intrinsics, points: &[ScoredPoint]) -> f64 {
    let mut total = 0.0;
    for p in points {
        match project(&p.world_point, intrinsics, extrinsics) {
            Some((u, v)) => {
                total += IN_FRONT_WEIGHT;
                let du = u - p.pixel.0;
                let dv = v - p.pixel.1;
                total -= du * du + dv * dv;
            }
            None => {}
        }
    }
    total
}

#[must_use]
pub fn mean_reprojection_error(extrinsics: &Extrinsics, intrinsics: &Intrinsics, points: &[ScoredPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let sum: f64 = points
        .iter()
        .map(|p| match project(&p.world_point, intrinsics, extrinsics) {
            Some((u, v)) => {
                let du = u - p.pixel.0;
                let dv = v - p.pixel.1;
                (du * du + dv * dv).sqrt()
            }
            None => MAX_MEAN_REPROJECTION_ERROR_PX * 4.0,
        })
        .sum();
    sum / points.len() as f64
}

/// Search all four even-parity sign flips of `rotation` and return the
/// best-scoring pose, or `None` if even the best one has a mean
/// reprojection error above 50px (spec §4.4). Flipping the rotation changes
/// the camera-to-world ray directions, so position is not invariant across
/// flips: `position_for` re-solves position from scratch for each flipped
/// rotation rather than reusing one position computed from the un-flipped
/// candidate.
#[must_use]
pub fn resolve_sign_ambiguity(
    rotation: Quaternion,
    intrinsics: &Intrinsics,
    points: &[ScoredPoint],
    position_for: impl Fn(Quaternion) -> Option<Vec3>,
) -> Option<Extrinsics> {
    let mut best: Option<(Extrinsics, f64)> = None;

    for signs in EVEN_PARITY_FLIPS {
        let flipped_rotation = apply_flip(rotation, signs);
        let Some(position) = position_for(flipped_rotation) else {
            continue;
        };
        let candidate = Extrinsics { rotation: flipped_rotation, position };
        let s = score(&candidate, intrinsics, points);
        if best.map_or(true, |(_, best_score)| s > best_score) {
            best = Some((candidate, s));
        }
    }

    let (best_extrinsics, _) = best?;
    let err = mean_reprojection_error(&best_extrinsics, intrinsics, points);
    if err > MAX_MEAN_REPROJECTION_ERROR_PX {
        return None;
    }
    Some(best_extrinsics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_flip_is_included_and_can_win() {
        let intrinsics = Intrinsics::new(1000.0, (500.0, 500.0));
        let extrinsics = Extrinsics { rotation: Quaternion::identity(), position: [0.0, 0.0, -5.0] };
        let points = vec![
            ScoredPoint { world_point: [0.0, 0.0, 0.0], pixel: project(&[0.0, 0.0, 0.0], &intrinsics, &extrinsics).unwrap() },
            ScoredPoint { world_point: [1.0, 0.5, 0.2], pixel: project(&[1.0, 0.5, 0.2], &intrinsics, &extrinsics).unwrap() },
        ];
        let resolved = resolve_sign_ambiguity(extrinsics.rotation, &intrinsics, &points, |_| Some(extrinsics.position)).unwrap();
        let err = mean_reprojection_error(&resolved, &intrinsics, &points);
        assert!(err < 1e-6);
    }

    #[test]
    fn wildly_wrong_pose_is_rejected() {
        let intrinsics = Intrinsics::new(1000.0, (500.0, 500.0));
        // points scattered with no relation to any flip of this rotation/position
        let points = vec![
            ScoredPoint { world_point: [100.0, 50.0, 3.0], pixel: (10.0, 10.0) },
            ScoredPoint { world_point: [-80.0, 40.0, 2.0], pixel: (990.0, 990.0) },
            ScoredPoint { world_point: [30.0, -60.0, 4.0], pixel: (500.0, 10.0) },
        ];
        let resolved = resolve_sign_ambiguity(Quaternion::identity(), &intrinsics, &points, |_| Some([0.0, 0.0, -5.0]));
        assert!(resolved.is_none());
    }
}
