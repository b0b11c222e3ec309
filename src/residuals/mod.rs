//! Residual/Jacobian engine (spec §4.8, component C8): builds typed
//! residuals for reprojection and every constraint variant over a packed
//! parameter vector, each residual carrying its own gradient via
//! `autodiff::Dual`.

pub mod autodiff;
pub mod constraints;
pub mod reprojection;

use std::collections::BTreeMap;

use crate::types::ids::{CameraId, PointId};
use crate::types::{Viewpoint, WorldPoint};

pub use autodiff::Dual;

/// Where a camera's optimizable quantities live in the packed parameter
/// vector. `rotation`/`position` are always present (spec §4.9: "for each
/// camera whose pose is optimized, 7 components"); the intrinsic block is
/// only present when `optimize_intrinsics` is on.
#[derive(Debug, Clone, Copy)]
pub struct CameraParamBlock {
    pub rotation: [usize; 4],
    pub position: [usize; 3],
    pub intrinsics: Option<IntrinsicsParamBlock>,
}

#[derive(Debug, Clone, Copy)]
pub struct IntrinsicsParamBlock {
    pub focal_length: usize,
    pub principal_point: [usize; 2],
    pub radial: [usize; 3],
    pub tangential: [usize; 2],
}

/// Maps every optimizable scalar (camera pose/intrinsics, free world-point
/// axes) to a slot in the packed parameter vector `x`. Locked point axes
/// and anything outside this layout are constants baked into the residual
/// functions, not parameters.
#[derive(Debug, Clone, Default)]
pub struct ParamLayout {
    pub len: usize,
    pub cameras: BTreeMap<CameraId, CameraParamBlock>,
    /// Per point, per axis (X=0,Y=1,Z=2): `Some(index)` if free, `None` if
    /// locked (fixed at its locked value, not a parameter).
    pub points: BTreeMap<PointId, [Option<usize>; 3]>,
}

impl ParamLayout {
    /// Build a fresh layout and the matching initial parameter vector `x0`
    /// from the current working-copy poses/positions.
    #[must_use]
    pub fn build(
        cameras: &BTreeMap<CameraId, Viewpoint>,
        points: &BTreeMap<PointId, WorldPoint>,
        optimize_intrinsics: bool,
    ) -> (Self, Vec<f64>) {
        let mut layout = Self::default();
        let mut x = Vec::new();

        let mut next = |x: &mut Vec<f64>, value: f64| -> usize {
            x.push(value);
            x.len() - 1
        };

        for (&id, camera) in cameras {
            let rotation = [
                next(&mut x, camera.extrinsics.rotation.w),
                next(&mut x, camera.extrinsics.rotation.x),
                next(&mut x, camera.extrinsics.rotation.y),
                next(&mut x, camera.extrinsics.rotation.z),
            ];
            let position = [
                next(&mut x, camera.extrinsics.position[0]),
                next(&mut x, camera.extrinsics.position[1]),
                next(&mut x, camera.extrinsics.position[2]),
            ];
            let intrinsics = optimize_intrinsics.then(|| IntrinsicsParamBlock {
                focal_length: next(&mut x, camera.intrinsics.focal_length),
                principal_point: [
                    next(&mut x, camera.intrinsics.principal_point.0),
                    next(&mut x, camera.intrinsics.principal_point.1),
                ],
                radial: [
                    next(&mut x, camera.intrinsics.radial[0]),
                    next(&mut x, camera.intrinsics.radial[1]),
                    next(&mut x, camera.intrinsics.radial[2]),
                ],
                tangential: [next(&mut x, camera.intrinsics.tangential[0]), next(&mut x, camera.intrinsics.tangential[1])],
            });
            layout.cameras.insert(id, CameraParamBlock { rotation, position, intrinsics });
        }

        for (&id, point) in points {
            let effective = point.effective_or_optimized();
            let mut axes = [None; 3];
            for axis in 0..3 {
                if !point.locked[axis].is_locked() {
                    axes[axis] = Some(next(&mut x, effective[axis]));
                }
            }
            layout.points.insert(id, axes);
        }

        layout.len = x.len();
        (layout, x)
    }

    /// Read a camera's current rotation quaternion from `x` as `Dual`s.
    #[must_use]
    pub fn camera_rotation(&self, camera: CameraId, x: &[f64]) -> [Dual; 4] {
        let block = &self.cameras[&camera];
        std::array::from_fn(|i| Dual::variable(x[block.rotation[i]], block.rotation[i], self.len))
    }

    #[must_use]
    pub fn camera_position(&self, camera: CameraId, x: &[f64]) -> [Dual; 3] {
        let block = &self.cameras[&camera];
        std::array::from_fn(|i| Dual::variable(x[block.position[i]], block.position[i], self.len))
    }

    #[must_use]
    pub fn camera_intrinsics(&self, camera: CameraId, x: &[f64], fallback: &crate::types::camera::Intrinsics) -> IntrinsicsDuals {
        // skew/aspect_ratio are never packed into the parameter vector (the
        // spec's optimizable intrinsic set is f, cx, cy, distortion only),
        // so they always ride through as constants from the camera's
        // current value, in both branches below.
        let skew = Dual::constant(fallback.skew, self.len);
        let aspect_ratio = Dual::constant(fallback.aspect_ratio, self.len);
        match self.cameras[&camera].intrinsics {
            Some(block) => IntrinsicsDuals {
                focal_length: Dual::variable(x[block.focal_length], block.focal_length, self.len),
                cx: Dual::variable(x[block.principal_point[0]], block.principal_point[0], self.len),
                cy: Dual::variable(x[block.principal_point[1]], block.principal_point[1], self.len),
                skew,
                aspect_ratio,
                radial: std::array::from_fn(|i| Dual::variable(x[block.radial[i]], block.radial[i], self.len)),
                tangential: std::array::from_fn(|i| Dual::variable(x[block.tangential[i]], block.tangential[i], self.len)),
            },
            None => IntrinsicsDuals {
                focal_length: Dual::constant(fallback.focal_length, self.len),
                cx: Dual::constant(fallback.principal_point.0, self.len),
                cy: Dual::constant(fallback.principal_point.1, self.len),
                skew,
                aspect_ratio,
                radial: std::array::from_fn(|i| Dual::constant(fallback.radial[i], self.len)),
                tangential: std::array::from_fn(|i| Dual::constant(fallback.tangential[i], self.len)),
            },
        }
    }

    /// Read a world-point's xyz from `x` as `Dual`s: a variable on free
    /// axes, a constant (the locked value) on locked ones.
    #[must_use]
    pub fn point_xyz(&self, point: PointId, x: &[f64], world_point: &WorldPoint) -> [Dual; 3] {
        let axes = self.points[&point];
        let locked = world_point.effective_or_optimized();
        std::array::from_fn(|i| match axes[i] {
            Some(idx) => Dual::variable(x[idx], idx, self.len),
            None => Dual::constant(locked[i], self.len),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IntrinsicsDuals {
    pub focal_length: Dual,
    pub cx: Dual,
    pub cy: Dual,
    pub skew: Dual,
    pub aspect_ratio: Dual,
    pub radial: [Dual; 3],
    pub tangential: [Dual; 2],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CameraId as Cam;

    #[test]
    fn build_assigns_distinct_indices_per_camera_and_point() {
        let mut cameras = BTreeMap::new();
        cameras.insert(Cam::new(0), Viewpoint::new(Cam::new(0), "a", 100, 100));
        let mut points = BTreeMap::new();
        points.insert(PointId::new(0), WorldPoint::new(PointId::new(0), "p").with_locked(0, 1.0));

        let (layout, x) = ParamLayout::build(&cameras, &points, false);
        assert_eq!(layout.len, x.len());
        assert_eq!(layout.cameras[&Cam::new(0)].rotation, [0, 1, 2, 3]);
        let axes = layout.points[&PointId::new(0)];
        assert!(axes[0].is_none()); // locked
        assert!(axes[1].is_some());
        assert!(axes[2].is_some());
    }
}
