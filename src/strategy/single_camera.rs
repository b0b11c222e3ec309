//! Single-camera-scene special case (spec §4.6): "single-camera scenes with
//! constrained observations skip Tier 3 and proceed straight to late-PnP."
//! Tried before the multi-camera tiers whenever the scene has exactly one
//! camera: VP-init first (subject to its own skip rule), PnP otherwise.

use std::collections::BTreeMap;

use crate::types::ids::{CameraId, LineId, PointId};
use crate::types::{Line, WorldPoint};

use super::snapshot::CameraState;
use super::{try_pnp_init, try_vp_init};

#[derive(Debug, Clone)]
pub struct SingleCameraOutcome {
    pub committed: bool,
    pub strategy: Option<&'static str>,
}

/// Attempt to initialize the scene's single camera. `locked_point_count_global`
/// feeds `try_vp_init`'s skip rule the same way it would in any other tier.
#[must_use]
pub fn run(
    cameras: &mut BTreeMap<CameraId, crate::types::Viewpoint>,
    world_points: &BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    camera_id: CameraId,
    locked_point_count_global: usize,
) -> SingleCameraOutcome {
    let Some(viewpoint) = cameras.get(&camera_id) else {
        return SingleCameraOutcome { committed: false, strategy: None };
    };
    let snapshot = CameraState::capture(viewpoint);

    let vp_outcome = {
        let vp = cameras.get_mut(&camera_id).expect("camera id must exist");
        try_vp_init(lines, world_points, vp, locked_point_count_global, true)
    };
    if vp_outcome.success {
        return SingleCameraOutcome { committed: true, strategy: Some("vp-init") };
    }

    let pnp_outcome = {
        let vp = cameras.get_mut(&camera_id).expect("camera id must exist");
        try_pnp_init(world_points, vp)
    };
    if pnp_outcome.success {
        return SingleCameraOutcome { committed: true, strategy: Some("pnp-init") };
    }

    if let Some(vp) = cameras.get_mut(&camera_id) {
        snapshot.restore(vp);
    }
    SingleCameraOutcome { committed: false, strategy: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::project::project;
    use crate::types::camera::{Extrinsics, Intrinsics};
    use crate::types::{ImagePoint, ImagePointId, Viewpoint};

    #[test]
    fn falls_back_to_pnp_when_vp_is_unavailable() {
        let intrinsics = Intrinsics::new(1000.0, (500.0, 500.0));
        let truth = Extrinsics::identity();

        let mut vp = Viewpoint::new(CameraId::new(0), "cam", 1000, 1000);
        vp.intrinsics = intrinsics;
        vp.extrinsics = Extrinsics { rotation: truth.rotation, position: [0.1, 0.0, -0.2] };

        let mut world_points = BTreeMap::new();
        let coords: [[f64; 3]; 6] = [
            [0.0, 0.0, 5.0],
            [1.0, 0.0, 5.0],
            [0.0, 1.0, 5.0],
            [1.0, 1.0, 5.0],
            [0.5, 0.5, 6.0],
            [-0.5, 0.2, 4.7],
        ];
        for (i, c) in coords.iter().enumerate() {
            let id = PointId::new(i as u32);
            let point = WorldPoint::new(id, format!("p{i}")).with_locked(0, c[0]).with_locked(1, c[1]).with_locked(2, c[2]);
            world_points.insert(id, point);
            let (u, v) = project(c, &intrinsics, &truth).unwrap();
            vp.image_points.push(ImagePoint::new(ImagePointId::new(i as u32), id, u, v));
        }

        let mut cameras = BTreeMap::new();
        cameras.insert(CameraId::new(0), vp);
        let lines: BTreeMap<LineId, Line> = BTreeMap::new();

        let outcome = run(&mut cameras, &world_points, &lines, CameraId::new(0), 6);
        assert!(outcome.committed);
        assert_eq!(outcome.strategy, Some("pnp-init"));
    }
}
