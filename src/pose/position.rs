//! Camera position from a fixed rotation plus two or more anchored points
//! (spec §4.4).
//!
//! Given the rotation, each observed anchored point's back-projected ray
//! direction `d` is known in world space (it doesn't depend on the unknown
//! camera center `C`). The point `P` must lie on the ray `C + t*d`, i.e.
//! `cross(P - C, d) = 0`, which is linear in `C`:
//! `skew(d) * C = cross(d, P)`. Stacking one 3x3 block per observation and
//! solving the normal equations gives a least-squares `C` from as few as
//! two points.

use crate::linalg::gauss;
use crate::linalg::mat3::{cross3, Vec3};

/// One observation feeding the position solve: the point's known world
/// position and the (unit) world-space ray direction from the camera
/// toward it.
#[derive(Debug, Clone, Copy)]
pub struct PositionObservation {
    pub point: Vec3,
    pub ray_direction: Vec3,
}

fn skew(d: Vec3) -> [Vec<f64>; 3] {
    [
        vec![0.0, -d[2], d[1]],
        vec![d[2], 0.0, -d[0]],
        vec![-d[1], d[0], 0.0],
    ]
}

/// Solve for camera center `C` from >= 2 anchored-point observations via
/// the normal equations `(AᵀA) C = Aᵀb`. Returns `None` if the stacked
/// system is singular (e.g. all rays parallel, or fewer than 2 usable
/// observations).
#[must_use]
pub fn position_from_anchors(observations: &[PositionObservation]) -> Option<Vec3> {
    if observations.len() < 2 {
        return None;
    }

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(observations.len() * 3);
    let mut rhs: Vec<f64> = Vec::with_capacity(observations.len() * 3);

    for obs in observations {
        let s = skew(obs.ray_direction);
        let b = cross3(&obs.ray_direction, &obs.point);
        for r in 0..3 {
            rows.push(s[r].clone());
            rhs.push(b[r]);
        }
    }

    let ata = gauss::ata(&rows);
    let atb = gauss::atb(&rows, &rhs);
    let solution = gauss::solve(&ata, &atb)?;
    Some([solution[0], solution[1], solution[2]])
}

/// Camera position from a single anchored point plus an externally known
/// depth (distance from the camera center to that point along its ray) —
/// the "relaxed" VP-init mode (one anchor, external scale reference) rather
/// than the usual two-or-more-anchor normal-equations solve.
#[must_use]
pub fn position_from_single_anchor(anchor: Vec3, ray_direction: Vec3, depth: f64) -> Vec3 {
    [anchor[0] - depth * ray_direction[0], anchor[1] - depth * ray_direction[1], anchor[2] - depth * ray_direction[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::mat3::{normalize3, sub3};

    #[test]
    fn recovers_known_camera_center() {
        let camera_center: Vec3 = [3.0, -1.0, 2.0];
        let points: [Vec3; 3] = [[0.0, 0.0, 0.0], [5.0, 1.0, -2.0], [-1.0, 4.0, 3.0]];

        let observations: Vec<PositionObservation> = points
            .iter()
            .map(|p| PositionObservation {
                point: *p,
                ray_direction: normalize3(&sub3(p, &camera_center)),
            })
            .collect();

        let recovered = position_from_anchors(&observations).unwrap();
        for i in 0..3 {
            assert!((recovered[i] - camera_center[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn fewer_than_two_observations_fails() {
        let obs = vec![PositionObservation { point: [0.0, 0.0, 0.0], ray_direction: [0.0, 0.0, 1.0] }];
        assert!(position_from_anchors(&obs).is_none());
    }
}
