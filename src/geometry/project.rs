//! Reprojection: world point -> pixel, with radial/tangential distortion
//! (spec §4.8).

use crate::linalg::mat3::sub3;
use crate::types::camera::{Extrinsics, Intrinsics};

/// Apply radial (k1,k2,k3) + tangential (p1,p2) distortion to normalized
/// camera-plane coordinates, matching the teacher's
/// `DistortionCoefficients::distort` formula.
#[must_use]
pub fn distort(x: f64, y: f64, radial: [f64; 3], tangential: [f64; 2]) -> (f64, f64) {
    let r2 = x * x + y * y;
    let r4 = r2 * r2;
    let r6 = r4 * r2;

    let radial_term = 1.0 + radial[0] * r2 + radial[1] * r4 + radial[2] * r6;

    let dx_tangential = 2.0 * tangential[0] * x * y + tangential[1] * (r2 + 2.0 * x * x);
    let dy_tangential = tangential[0] * (r2 + 2.0 * y * y) + 2.0 * tangential[1] * x * y;

    (x * radial_term + dx_tangential, y * radial_term + dy_tangential)
}

/// Project a world point into pixel coordinates. Returns `None` when the
/// point is behind the camera (`cam_z <= 0`) — callers that need a residual
/// rather than an `Option` add a behind-camera penalty instead (spec §4.8).
#[must_use]
pub fn project(point: &[f64; 3], intrinsics: &Intrinsics, extrinsics: &Extrinsics) -> Option<(f64, f64)> {
    let cam = extrinsics.rotation.inverse().rotate_vector(sub3(point, &extrinsics.position));
    if cam[2] <= 0.0 {
        return None;
    }
    let xn = cam[0] / cam[2];
    let yn = cam[1] / cam[2];
    let (xd, yd) = distort(xn, yn, intrinsics.radial, intrinsics.tangential);

    let (cx, cy) = intrinsics.principal_point;
    let u = intrinsics.focal_length * xd + intrinsics.skew * yd + cx;
    // V is inverted relative to camera Y (spec §6).
    let v = cy - intrinsics.focal_length * intrinsics.aspect_ratio * yd;
    Some((u, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Quaternion;

    #[test]
    fn projecting_the_principal_axis_hits_the_principal_point() {
        let intr = Intrinsics::new(800.0, (320.0, 240.0));
        let extr = Extrinsics { rotation: Quaternion::identity(), position: [0.0, 0.0, 0.0] };
        let (u, v) = project(&[0.0, 0.0, 5.0], &intr, &extr).unwrap();
        assert!((u - 320.0).abs() < 1e-9);
        assert!((v - 240.0).abs() < 1e-9);
    }

    #[test]
    fn point_behind_camera_has_no_projection() {
        let intr = Intrinsics::new(800.0, (320.0, 240.0));
        let extr = Extrinsics { rotation: Quaternion::identity(), position: [0.0, 0.0, 0.0] };
        assert!(project(&[0.0, 0.0, -5.0], &intr, &extr).is_none());
    }

    #[test]
    fn distortion_is_identity_at_zero_coefficients() {
        let (x, y) = distort(0.3, 0.2, [0.0, 0.0, 0.0], [0.0, 0.0]);
        assert_eq!((x, y), (0.3, 0.2));
    }
}
