//! 4x4 matrix inverse, built on the general Gauss-Jordan solver. Used for
//! homogeneous transforms (e.g. composing a world-alignment rigid
//! transform with the working frame during frame alignment, spec §4.7).

use super::gauss;

pub type Mat4 = [[f64; 4]; 4];

#[must_use]
pub fn identity4() -> Mat4 {
    let mut m = [[0.0; 4]; 4];
    for i in 0..4 {
        m[i][i] = 1.0;
    }
    m
}

/// Inverse via Gauss-Jordan elimination with partial pivoting. `None` on a
/// singular pivot.
#[must_use]
pub fn inverse4(m: &Mat4) -> Option<Mat4> {
    let rows: Vec<Vec<f64>> = m.iter().map(|r| r.to_vec()).collect();
    let inv = gauss::invert(&rows)?;
    let mut out = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            out[i][j] = inv[i][j];
        }
    }
    Some(out)
}

#[must_use]
pub fn mul4(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..4 {
            out[i][j] = (0..4).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

#[must_use]
pub fn mul4_vec(m: &Mat4, v: &[f64; 4]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for i in 0..4 {
        out[i] = (0..4).map(|k| m[i][k] * v[k]).sum();
    }
    out
}

/// Build a homogeneous rigid transform (rotation + translation, uniform
/// scale) from its parts.
#[must_use]
pub fn rigid_transform(rotation: &super::mat3::Mat3, translation: [f64; 3], scale: f64) -> Mat4 {
    let mut m = identity4();
    for i in 0..3 {
        for j in 0..3 {
            m[i][j] = rotation[i][j] * scale;
        }
        m[i][3] = translation[i];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_of_identity_is_identity() {
        let inv = inverse4(&identity4()).unwrap();
        assert_eq!(inv, identity4());
    }

    #[test]
    fn singular_4x4_has_no_inverse() {
        let m = [
            [1.0, 2.0, 3.0, 4.0],
            [2.0, 4.0, 6.0, 8.0],
            [0.0, 1.0, 0.0, 1.0],
            [1.0, 0.0, 1.0, 0.0],
        ];
        assert!(inverse4(&m).is_none());
    }

    #[test]
    fn rigid_transform_round_trips_translation() {
        use super::super::mat3::identity3;
        let m = rigid_transform(&identity3(), [1.0, 2.0, 3.0], 1.0);
        let v = mul4_vec(&m, &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(v, [1.0, 2.0, 3.0, 1.0]);
    }
}
