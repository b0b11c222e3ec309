//! Rotation from two or three vanishing points (spec §4.4).
//!
//! Each available axis's vanishing point gives a camera-space direction
//! (normalize the back-projected ray through the VP pixel). With all three
//! axes available the three directions are assembled directly as the
//! columns of the rotation matrix. With exactly two, the third is derived
//! by a cross product — and since the cross product can go either way,
//! both chiralities are returned as separate candidates for the caller
//! (the sign-combination search, `pose::signs`) to disambiguate later.

use std::collections::BTreeMap;

use crate::linalg::mat3::{cross3, normalize3, Mat3, Vec3};
use crate::linalg::Quaternion;
use crate::types::Axis;

/// Back-projected, normalized camera-space direction of a vanishing point.
fn camera_direction(vp: (f64, f64), principal_point: (f64, f64), focal_length: f64) -> Vec3 {
    let (cx, cy) = principal_point;
    normalize3(&[(vp.0 - cx) / focal_length, (cy - vp.1) / focal_length, 1.0])
}

/// Project a camera-space direction (not a point) back to a pixel
/// u-coordinate, for the roll-correction search below.
fn project_u(direction: Vec3, principal_point: (f64, f64), focal_length: f64) -> f64 {
    if direction[2].abs() < 1e-9 {
        return f64::INFINITY;
    }
    principal_point.0 + focal_length * direction[0] / direction[2]
}

fn columns_to_matrix(x: Vec3, y: Vec3, z: Vec3) -> Mat3 {
    [[x[0], y[0], z[0]], [x[1], y[1], z[1]], [x[2], y[2], z[2]]]
}

/// One candidate rotation, tagged with which axis (if any) was derived by
/// cross product rather than observed directly — only a derived Y axis is
/// eligible for roll correction (spec §4.4).
struct Candidate {
    matrix: Mat3,
    derived_axis: Option<Axis>,
}

/// Derive candidate camera rotations from the vanishing points available
/// for this viewpoint. Returns an empty vector if fewer than two axes have
/// a vanishing point (rotation is underdetermined from VPs alone).
#[must_use]
pub fn rotation_from_vps(
    vps: &BTreeMap<Axis, (f64, f64)>,
    principal_point: (f64, f64),
    focal_length: f64,
) -> Vec<Quaternion> {
    let dir = |axis: Axis| vps.get(&axis).map(|&p| camera_direction(p, principal_point, focal_length));

    let dx = dir(Axis::X);
    let dy = dir(Axis::Y);
    let dz = dir(Axis::Z);

    let mut candidates = Vec::new();

    match (dx, dy, dz) {
        (Some(x), Some(y), Some(z)) => {
            candidates.push(Candidate { matrix: columns_to_matrix(x, y, z), derived_axis: None });
        }
        (Some(x), None, Some(z)) => {
            // the common case: derive Y from X and Z, both chiralities
            let y1 = normalize3(&cross3(&z, &x));
            let y2 = normalize3(&cross3(&x, &z));
            candidates.push(Candidate { matrix: columns_to_matrix(x, y1, z), derived_axis: Some(Axis::Y) });
            candidates.push(Candidate { matrix: columns_to_matrix(x, y2, z), derived_axis: Some(Axis::Y) });
        }
        (None, Some(y), Some(z)) => {
            let x1 = normalize3(&cross3(&y, &z));
            let x2 = normalize3(&cross3(&z, &y));
            candidates.push(Candidate { matrix: columns_to_matrix(x1, y, z), derived_axis: Some(Axis::X) });
            candidates.push(Candidate { matrix: columns_to_matrix(x2, y, z), derived_axis: Some(Axis::X) });
        }
        (Some(x), Some(y), None) => {
            let z1 = normalize3(&cross3(&x, &y));
            let z2 = normalize3(&cross3(&y, &x));
            candidates.push(Candidate { matrix: columns_to_matrix(x, y, z1), derived_axis: Some(Axis::Z) });
            candidates.push(Candidate { matrix: columns_to_matrix(x, y, z2), derived_axis: Some(Axis::Z) });
        }
        _ => return Vec::new(),
    }

    candidates
        .into_iter()
        .map(|c| {
            let matrix = if c.derived_axis == Some(Axis::Y) {
                roll_correct(c.matrix, vps, principal_point, focal_length)
            } else {
                c.matrix
            };
            Quaternion::from_rotation_matrix(&matrix)
        })
        .collect()
}

const ROLL_STEP: f64 = 0.05;

/// Brute-force search over roll about the camera's own optical axis to
/// pull the derived Y column toward where it "should" project: the
/// midpoint, in u, of the X and Z vanishing points. Applied only when the
/// improvement over no correction is more than a token amount (spec §4.4:
/// "reduces error meaningfully (>0.001 rad change)").
fn roll_correct(matrix: Mat3, vps: &BTreeMap<Axis, (f64, f64)>, principal_point: (f64, f64), focal_length: f64) -> Mat3 {
    let (Some(&vp_x), Some(&vp_z)) = (vps.get(&Axis::X), vps.get(&Axis::Z)) else {
        return matrix;
    };
    let expected_u = (vp_x.0 + vp_z.0) / 2.0;

    let x_col = [matrix[0][0], matrix[1][0], matrix[2][0]];
    let y_col = [matrix[0][1], matrix[1][1], matrix[2][1]];
    let z_col = [matrix[0][2], matrix[1][2], matrix[2][2]];

    let error_at = |roll: f64| -> f64 {
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], roll);
        let y_rolled = q.rotate_vector(y_col);
        let u = project_u(y_rolled, principal_point, focal_length);
        (u - expected_u).powi(2)
    };

    let baseline_error = error_at(0.0);
    let mut best_roll = 0.0;
    let mut best_error = baseline_error;

    let mut roll = -std::f64::consts::PI;
    while roll <= std::f64::consts::PI {
        let e = error_at(roll);
        if e < best_error {
            best_error = e;
            best_roll = roll;
        }
        roll += ROLL_STEP;
    }

    if best_error >= baseline_error || best_roll.abs() <= 0.001 {
        return matrix;
    }

    let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], best_roll);
    let x2 = q.rotate_vector(x_col);
    let y2 = q.rotate_vector(y_col);
    let z2 = q.rotate_vector(z_col);
    columns_to_matrix(x2, y2, z2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_axes_present_assemble_directly() {
        let mut vps = BTreeMap::new();
        // X vp far to the right, Z vp far below, Y vp far above -> near-identity-ish basis
        vps.insert(Axis::X, (10_000.0, 500.0));
        vps.insert(Axis::Z, (500.0, 500.0 + 1.0));
        vps.insert(Axis::Y, (500.0, -9_000.0));
        let candidates = rotation_from_vps(&vps, (500.0, 500.0), 1000.0);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn two_axes_give_two_chirality_candidates() {
        let mut vps = BTreeMap::new();
        vps.insert(Axis::X, (10_000.0, 500.0));
        vps.insert(Axis::Z, (500.0, 10_500.0));
        let candidates = rotation_from_vps(&vps, (500.0, 500.0), 1000.0);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn single_axis_is_underdetermined() {
        let mut vps = BTreeMap::new();
        vps.insert(Axis::X, (10_000.0, 500.0));
        let candidates = rotation_from_vps(&vps, (500.0, 500.0), 1000.0);
        assert!(candidates.is_empty());
    }

    #[test]
    fn resulting_matrices_are_orthonormal() {
        let mut vps = BTreeMap::new();
        vps.insert(Axis::X, (10_000.0, 500.0));
        vps.insert(Axis::Z, (500.0, 10_500.0));
        for q in rotation_from_vps(&vps, (500.0, 500.0), 1000.0) {
            let m = q.to_rotation_matrix();
            let col = |c: usize| [m[0][c], m[1][c], m[2][c]];
            for c in 0..3 {
                let v = col(c);
                let n: f64 = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                assert!((n - 1.0).abs() < 1e-6);
            }
        }
    }
}
