//! Per-camera state capture and restore (spec §4.5): "before mutating,
//! every evaluator captures a `CameraState` (position, rotation, focal) and
//! offers a restore." Plain value copy — no cyclic ownership to unwind.

use crate::types::camera::{Extrinsics, Intrinsics};
use crate::types::Viewpoint;

/// A camera's mutable pose + focal length, captured before a strategy
/// evaluator mutates the viewpoint so the orchestrator can roll back a
/// failed or superseded attempt cheaply.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    pub extrinsics: Extrinsics,
    pub intrinsics: Intrinsics,
}

impl CameraState {
    #[must_use]
    pub fn capture(viewpoint: &Viewpoint) -> Self {
        Self { extrinsics: viewpoint.extrinsics, intrinsics: viewpoint.intrinsics }
    }

    pub fn restore(&self, viewpoint: &mut Viewpoint) {
        viewpoint.extrinsics = self.extrinsics;
        viewpoint.intrinsics = self.intrinsics;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::Quaternion;
    use crate::types::CameraId;

    #[test]
    fn restore_undoes_a_mutation() {
        let mut vp = Viewpoint::new(CameraId::new(0), "cam", 800, 600);
        let snapshot = CameraState::capture(&vp);

        vp.extrinsics.position = [1.0, 2.0, 3.0];
        vp.extrinsics.rotation = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 0.5);
        vp.intrinsics.focal_length = 123.0;

        snapshot.restore(&mut vp);
        assert_eq!(vp.extrinsics.position, [0.0, 0.0, 0.0]);
        assert_eq!(vp.intrinsics.focal_length, 800.0);
    }
}
