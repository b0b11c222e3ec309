//! Essential-matrix pose from two-view correspondences (spec §4.4 / §4.6
//! Tier 3 fallback): linear 8-point estimation, rank-2 enforcement via a
//! from-scratch 3x3 SVD built on the kernel's eigen routines, the standard
//! four-candidate `(R, t)` decomposition, and cheirality selection by
//! triangulating one representative point.

use crate::geometry::ray::{is_in_front, triangulate, Ray};
use crate::linalg::eigen::{largest_eigenvector, smallest_eigenvector, smallest_singular_vector};
use crate::linalg::mat3::{cross3, mul3, mul3_vec, normalize3, scale3, transpose3, Mat3, Vec3};
use crate::linalg::Quaternion;
use crate::types::camera::Extrinsics;

/// A shared point's normalized (unit) camera-space ray direction in each of
/// two views.
#[derive(Debug, Clone, Copy)]
pub struct Correspondence {
    pub ray1: Vec3,
    pub ray2: Vec3,
}

/// Estimate the essential matrix from >= 7 correspondences via the linear
/// 8-point algorithm, then enforce the rank-2 / equal-singular-value
/// structure every essential matrix must have. With exactly 7
/// correspondences the homogeneous system's null space is two-dimensional
/// rather than one-dimensional; `smallest_singular_vector`'s shifted inverse
/// iteration still converges to a single vector from within it, giving an
/// approximate E rather than the exact one a dedicated 7-point solver (cubic
/// in the null-space combination) would recover. Returns `None` with fewer
/// than 7 correspondences or a singular normal-equations system.
#[must_use]
pub fn estimate_essential_matrix(correspondences: &[Correspondence]) -> Option<Mat3> {
    if correspondences.len() < 7 {
        return None;
    }

    let rows: Vec<Vec<f64>> = correspondences
        .iter()
        .map(|c| {
            let (x1, y1, z1) = (c.ray1[0], c.ray1[1], c.ray1[2]);
            let (x2, y2, z2) = (c.ray2[0], c.ray2[1], c.ray2[2]);
            vec![
                x2 * x1, x2 * y1, x2 * z1, y2 * x1, y2 * y1, y2 * z1, z2 * x1, z2 * y1, z2 * z1,
            ]
        })
        .collect();

    let h = smallest_singular_vector(&rows)?;
    let raw = [
        [h[0], h[1], h[2]],
        [h[3], h[4], h[5]],
        [h[6], h[7], h[8]],
    ];

    let (u, _s, v) = svd3(&raw)?;
    let vt = transpose3(&v);
    // enforce singular values (1, 1, 0): E = U * diag(1,1,0) * Vt
    let diag = [[u[0][0], u[0][1], 0.0], [u[1][0], u[1][1], 0.0], [u[2][0], u[2][1], 0.0]];
    Some(mul3(&diag, &vt))
}

/// Approximate SVD of a general 3x3 matrix: `V` from the eigenvectors of
/// `MᵀM` (largest, then the cross-product complement, then smallest),
/// singular values from `‖M v_i‖`, and `U` columns from `M v_i / sigma_i`
/// (with `u2` completed by cross product when `sigma2` is near zero, which
/// is the expected case for a rank-2 essential matrix).
fn svd3(m: &Mat3) -> Option<(Mat3, [f64; 3], Mat3)> {
    let mt = transpose3(m);
    let mtm = mul3(&mt, m);
    let mtm_rows: Vec<Vec<f64>> = mtm.iter().map(|r| r.to_vec()).collect();

    let v0 = largest_eigenvector(&mtm_rows)?;
    let v2 = smallest_eigenvector(&mtm_rows)?;
    let v0: Vec3 = [v0[0], v0[1], v0[2]];
    let v2: Vec3 = [v2[0], v2[1], v2[2]];
    let v1 = normalize3(&cross3(&v2, &v0));

    let sigma_of = |v: Vec3| -> (f64, Vec3) {
        let mv = mul3_vec(m, &v);
        let s = (mv[0] * mv[0] + mv[1] * mv[1] + mv[2] * mv[2]).sqrt();
        (s, mv)
    };

    let (s0, mv0) = sigma_of(v0);
    let (s1, mv1) = sigma_of(v1);
    let u0 = if s0 > 1e-9 { scale3(&mv0, 1.0 / s0) } else { [1.0, 0.0, 0.0] };
    let u1 = if s1 > 1e-9 { scale3(&mv1, 1.0 / s1) } else { [0.0, 1.0, 0.0] };
    let u2 = normalize3(&cross3(&u0, &u1));

    let u = [[u0[0], u1[0], u2[0]], [u0[1], u1[1], u2[1]], [u0[2], u1[2], u2[2]]];
    let v = [[v0[0], v1[0], v2[0]], [v0[1], v1[1], v2[1]], [v0[2], v1[2], v2[2]]];

    Some((u, [s0, s1, 0.0], v))
}

const W: Mat3 = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];

fn det3(m: &Mat3) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// The four standard `(R, t)` candidates implied by an essential matrix's
/// SVD, relative to a camera 1 held at the identity pose.
#[must_use]
pub fn decompose_essential(e: &Mat3) -> Option<Vec<(Mat3, Vec3)>> {
    let (u, _s, v) = svd3(e)?;
    let vt = transpose3(&v);

    let mut r_a = mul3(&mul3(&u, &W), &vt);
    if det3(&r_a) < 0.0 {
        r_a = [[-r_a[0][0], -r_a[0][1], -r_a[0][2]], [-r_a[1][0], -r_a[1][1], -r_a[1][2]], [-r_a[2][0], -r_a[2][1], -r_a[2][2]]];
    }
    let wt = transpose3(&W);
    let mut r_b = mul3(&mul3(&u, &wt), &vt);
    if det3(&r_b) < 0.0 {
        r_b = [[-r_b[0][0], -r_b[0][1], -r_b[0][2]], [-r_b[1][0], -r_b[1][1], -r_b[1][2]], [-r_b[2][0], -r_b[2][1], -r_b[2][2]]];
    }

    let t = [u[0][2], u[1][2], u[2][2]];
    let neg_t = [-t[0], -t[1], -t[2]];

    Some(vec![(r_a, t), (r_a, neg_t), (r_b, t), (r_b, neg_t)])
}

/// Pick the one `(R, t)` candidate (of the four from `decompose_essential`)
/// that puts a representative triangulated point in front of both cameras,
/// returning camera 2's pose relative to camera 1 held at the identity.
#[must_use]
pub fn select_by_cheirality(candidates: &[(Mat3, Vec3)], representative: Correspondence) -> Option<Extrinsics> {
    let cam1 = Extrinsics::identity();

    for &(r, t) in candidates {
        let rotation = Quaternion::from_rotation_matrix(&r);
        // t from decompose_essential is expressed as x2 = R x1 + t; our
        // Extrinsics convention stores the camera *center*, so invert.
        let rt = mul3_vec(&r, &t);
        let position = [-rt[0], -rt[1], -rt[2]];
        let cam2 = Extrinsics { rotation, position };

        let ray1 = Ray { origin: cam1.position, direction: normalize3(&representative.ray1) };
        let world_dir2 = rotation.inverse().rotate_vector(normalize3(&representative.ray2));
        let ray2 = Ray { origin: cam2.position, direction: normalize3(&world_dir2) };

        let point = triangulate(&ray1, &ray2, 10.0);
        if is_in_front(&point, &cam1) && is_in_front(&point, &cam2) {
            return Some(cam2);
        }
    }
    None
}
