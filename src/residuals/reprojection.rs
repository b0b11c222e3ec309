//! Reprojection residual (spec §4.8): 2 residuals per visible image-point,
//! `(projected_u - observed_u, projected_v - observed_v)`, differentiated
//! through world->camera, perspective divide, distortion, and the pixel
//! mapping via `autodiff::Dual`.

use super::autodiff::Dual;
use super::IntrinsicsDuals;

/// A unit-quaternion-shaped `Dual` rotation, carrying its own gradients
/// through conjugate/inverse/multiply/rotate — the `Dual` counterpart of
/// `crate::linalg::Quaternion`, kept local since residual code is the only
/// caller that needs quaternion ops with a gradient attached.
struct DualQuat {
    w: Dual,
    x: Dual,
    y: Dual,
    z: Dual,
}

impl DualQuat {
    fn from_components(q: &[Dual; 4]) -> Self {
        Self { w: q[0].clone(), x: q[1].clone(), y: q[2].clone(), z: q[3].clone() }
    }

    fn conjugate(&self) -> Self {
        Self { w: self.w.clone(), x: -&self.x, y: -&self.y, z: -&self.z }
    }

    fn norm_squared(&self) -> Dual {
        let ww = &self.w * &self.w;
        let xx = &self.x * &self.x;
        let yy = &self.y * &self.y;
        let zz = &self.z * &self.z;
        &(&ww + &xx) + &(&yy + &zz)
    }

    fn inverse(&self) -> Self {
        let n2 = self.norm_squared();
        let c = self.conjugate();
        Self { w: &c.w / &n2, x: &c.x / &n2, y: &c.y / &n2, z: &c.z / &n2 }
    }

    fn multiply(&self, rhs: &Self) -> Self {
        let w = &(&(&self.w * &rhs.w) - &(&self.x * &rhs.x)) - &(&(&self.y * &rhs.y) + &(&self.z * &rhs.z));
        let x = &(&(&self.w * &rhs.x) + &(&self.x * &rhs.w)) + &(&(&self.y * &rhs.z) - &(&self.z * &rhs.y));
        let y = &(&(&self.w * &rhs.y) - &(&self.x * &rhs.z)) + &(&(&self.y * &rhs.w) + &(&self.z * &rhs.x));
        let z = &(&(&self.w * &rhs.z) + &(&self.x * &rhs.y)) - &(&(&self.y * &rhs.x) - &(&self.z * &rhs.w));
        Self { w, x, y, z }
    }

    fn rotate_vector(&self, v: &[Dual; 3]) -> [Dual; 3] {
        let n = self.w.n_params();
        let zero = Dual::constant(0.0, n);
        let qv = Self { w: zero, x: v[0].clone(), y: v[1].clone(), z: v[2].clone() };
        let r = self.multiply(&qv).multiply(&self.conjugate());
        [r.x, r.y, r.z]
    }
}

/// The projected pixel `(u, v)` of `point_world` seen by a camera whose
/// rotation/position/intrinsics are already `Dual`-valued parameters, plus
/// the camera-space depth (for the caller's behind-camera check). Mirrors
/// `crate::geometry::project::project`, but propagating gradients and never
/// returning `None` for behind-camera points — callers add the large
/// penalty themselves (spec §4.8 "behind-camera samples contribute a large
/// penalty").
#[must_use]
pub fn project_dual(
    point_world: &[Dual; 3],
    rotation: &[Dual; 4],
    position: &[Dual; 3],
    intrinsics: &IntrinsicsDuals,
) -> (Dual, Dual, Dual) {
    let q = DualQuat::from_components(rotation);
    let diff = [&point_world[0] - &position[0], &point_world[1] - &position[1], &point_world[2] - &position[2]];
    let cam = q.inverse().rotate_vector(&diff);

    let cam_z = cam[2].clone();
    let xn = &cam[0] / &cam_z;
    let yn = &cam[1] / &cam_z;

    let r2 = &(&xn * &xn) + &(&yn * &yn);
    let r4 = &r2 * &r2;
    let r6 = &r4 * &r2;
    let radial_term = {
        let k1r2 = &intrinsics.radial[0] * &r2;
        let k2r4 = &intrinsics.radial[1] * &r4;
        let k3r6 = &intrinsics.radial[2] * &r6;
        (&(&k1r2 + &k2r4) + &k3r6).add_scalar(1.0)
    };

    let xy2 = (&xn * &yn).scale(2.0);
    let xx2 = (&xn * &xn).scale(2.0);
    let yy2 = (&yn * &yn).scale(2.0);
    let dx_tangential = &(&intrinsics.tangential[0] * &xy2) + &(&intrinsics.tangential[1] * &(&r2 + &xx2));
    let dy_tangential = &(&intrinsics.tangential[0] * &(&r2 + &yy2)) + &(&intrinsics.tangential[1] * &xy2);

    let xd = &(&xn * &radial_term) + &dx_tangential;
    let yd = &(&yn * &radial_term) + &dy_tangential;

    let u = &(&(&intrinsics.focal_length * &xd) + &(&intrinsics.skew * &yd)) + &intrinsics.cx;
    let v = &intrinsics.cy - &(&(&intrinsics.focal_length * &intrinsics.aspect_ratio) * &yd);
    (u, v, cam_z)
}

/// Penalty added to a residual whose source point lies behind the camera
/// (`cam_z <= 0`), large enough to steer the solver away from such poses
/// without producing a discontinuous/NaN gradient.
pub const BEHIND_CAMERA_PENALTY: f64 = 1.0e4;

/// Build the two reprojection residuals for one image-point observation.
#[must_use]
pub fn reprojection_residuals(
    point_world: &[Dual; 3],
    rotation: &[Dual; 4],
    position: &[Dual; 3],
    intrinsics: &IntrinsicsDuals,
    observed_u: f64,
    observed_v: f64,
) -> [Dual; 2] {
    let (u, v, cam_z) = project_dual(point_world, rotation, position, intrinsics);
    let mut ru = &u - &Dual::constant(observed_u, u.n_params());
    let mut rv = &v - &Dual::constant(observed_v, v.n_params());
    if cam_z.value <= 0.0 {
        ru = ru.add_scalar(BEHIND_CAMERA_PENALTY);
        rv = rv.add_scalar(BEHIND_CAMERA_PENALTY);
    }
    [ru, rv]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Quaternion;

    fn duals_from_f64(v: [f64; 3], n: usize, base: usize) -> [Dual; 3] {
        std::array::from_fn(|i| Dual::variable(v[i], base + i, n))
    }

    #[test]
    fn reprojecting_principal_axis_hits_principal_point() {
        let n = 10;
        let point = duals_from_f64([0.0, 0.0, 5.0], n, 0);
        let q = Quaternion::identity();
        let rotation = [
            Dual::constant(q.w, n),
            Dual::constant(q.x, n),
            Dual::constant(q.y, n),
            Dual::constant(q.z, n),
        ];
        let position = [Dual::constant(0.0, n), Dual::constant(0.0, n), Dual::constant(0.0, n)];
        let intrinsics = IntrinsicsDuals {
            focal_length: Dual::constant(800.0, n),
            cx: Dual::constant(320.0, n),
            cy: Dual::constant(240.0, n),
            skew: Dual::constant(0.0, n),
            aspect_ratio: Dual::constant(1.0, n),
            radial: [Dual::constant(0.0, n), Dual::constant(0.0, n), Dual::constant(0.0, n)],
            tangential: [Dual::constant(0.0, n), Dual::constant(0.0, n)],
        };

        let (u, v, _) = project_dual(&point, &rotation, &position, &intrinsics);
        assert!((u.value - 320.0).abs() < 1e-9);
        assert!((v.value - 240.0).abs() < 1e-9);
        assert!((u.grad[2]).abs() > 0.0); // u depends on point z through the perspective divide
    }
}
