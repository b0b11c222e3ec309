//! Tier 1 — first-tier (spec §4.6): the first camera that can VP-init gets
//! it, then every remaining camera attempts PnP. If fewer than 3 points are
//! locked scene-wide and some remaining camera can't be reliably PnP-ed, the
//! multi-camera rollback rule decides whether to widen the committed set
//! (case a: step another camera via VP, case b: essential-matrix + VP
//! rotation composition), shrink it to the VP camera alone pending
//! late-PnP (case c), or revert entirely.

use std::collections::BTreeMap;

use crate::types::ids::{CameraId, LineId, PointId};
use crate::types::{Line, Viewpoint, WorldPoint};

use super::snapshot::CameraState;
use super::{shared_point_count, try_essential_init, try_pnp_init, try_vp_init, EvalOutcome};

const MIN_POINTS_FOR_PNP: usize = 3;
const MIN_SHARED_FOR_VP_STEP: usize = 1;
const MIN_CORRESPONDENCES_FOR_EM: usize = 7;
const MIN_SHARED_FOR_LATE_PNP: usize = 3;
const GLOBAL_LOCKED_POINT_RELAXATION_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct FirstTierOutcome {
    pub committed: bool,
    pub initialized: Vec<CameraId>,
    pub used_essential_matrix: bool,
}

fn constrained_point_count(viewpoint: &Viewpoint, world_points: &BTreeMap<PointId, WorldPoint>) -> usize {
    viewpoint
        .image_points
        .iter()
        .filter(|ip| ip.visible)
        .filter(|ip| world_points.get(&ip.world_point).is_some_and(WorldPoint::fully_constrained))
        .count()
}

fn restore_all(cameras: &mut BTreeMap<CameraId, Viewpoint>, snapshots: &BTreeMap<CameraId, CameraState>) {
    for (id, snap) in snapshots {
        if let Some(vp) = cameras.get_mut(id) {
            snap.restore(vp);
        }
    }
}

/// Run Tier 1 over `uninitialized` cameras.
#[must_use]
pub fn run(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    world_points: &BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    uninitialized: &[CameraId],
    locked_point_count_global: usize,
) -> FirstTierOutcome {
    let none = FirstTierOutcome { committed: false, initialized: Vec::new(), used_essential_matrix: false };
    if uninitialized.is_empty() {
        return none;
    }

    let snapshots: BTreeMap<CameraId, CameraState> =
        uninitialized.iter().map(|&id| (id, CameraState::capture(&cameras[&id]))).collect();

    let single_camera_scene = uninitialized.len() == 1;
    let vp_id = uninitialized.iter().copied().find(|&id| {
        let vp = cameras.get_mut(&id).expect("uninitialized camera id must exist");
        try_vp_init(lines, world_points, vp, locked_point_count_global, single_camera_scene).success
    });

    let Some(vp_id) = vp_id else {
        restore_all(cameras, &snapshots);
        return none;
    };

    let mut initialized = vec![vp_id];
    let mut all_pnp_reliable = true;
    let remaining: Vec<CameraId> = uninitialized.iter().copied().filter(|&id| id != vp_id).collect();

    for &id in &remaining {
        let constrained = constrained_point_count(&cameras[&id], world_points);
        if constrained >= MIN_POINTS_FOR_PNP {
            let vp = cameras.get_mut(&id).expect("uninitialized camera id must exist");
            let outcome = try_pnp_init(world_points, vp);
            if outcome.success && outcome.reliable {
                initialized.push(id);
            } else {
                all_pnp_reliable = false;
            }
        } else {
            all_pnp_reliable = false;
        }
    }

    if all_pnp_reliable || locked_point_count_global >= GLOBAL_LOCKED_POINT_RELAXATION_THRESHOLD {
        return FirstTierOutcome { committed: true, initialized, used_essential_matrix: false };
    }

    // Multi-camera rollback rule.
    let failed: Vec<CameraId> = remaining.iter().copied().filter(|id| !initialized.contains(id)).collect();

    // (a) a failed camera shares >= 1 constrained point with the VP camera
    // and can itself VP-init.
    for &candidate in &failed {
        let shared = shared_point_count(&cameras[&vp_id], &cameras[&candidate]);
        if shared < MIN_SHARED_FOR_VP_STEP {
            continue;
        }
        let outcome = {
            let vp = cameras.get_mut(&candidate).expect("uninitialized camera id must exist");
            try_vp_init(lines, world_points, vp, locked_point_count_global, false)
        };
        if outcome.success {
            initialized.push(candidate);
            return FirstTierOutcome { committed: true, initialized, used_essential_matrix: false };
        }
    }

    // (b) the first two uninitialized cameras share >= 7 points: run
    // essential-matrix between VP-camera and EM-candidate, then compose the
    // VP rotation onto EM's result so the world frame stays VP-aligned.
    if remaining.len() >= 2 {
        let em_candidate = remaining[0];
        let shared = shared_point_count(&cameras[&vp_id], &cameras[&em_candidate]);
        if shared >= MIN_CORRESPONDENCES_FOR_EM {
            let vp_rotation = cameras[&vp_id].extrinsics.rotation;
            let vp_position = cameras[&vp_id].extrinsics.position;

            let outcome = run_essential_pair(cameras, &vp_id, &em_candidate);
            if outcome.success {
                if let Some(vp) = cameras.get_mut(&vp_id) {
                    vp.extrinsics.rotation = vp_rotation;
                    vp.extrinsics.position = vp_position;
                }
                if let Some(em) = cameras.get_mut(&em_candidate) {
                    em.extrinsics.rotation = vp_rotation.multiply(em.extrinsics.rotation);
                    // world = R*cam_space + position (project.rs), so composing
                    // T_vp after T_em needs the translation term too, not just
                    // the rotated position.
                    em.extrinsics.position = crate::linalg::mat3::add3(
                        &vp_rotation.rotate_vector(em.extrinsics.position),
                        &vp_position,
                    );
                }
                initialized.push(em_candidate);
                return FirstTierOutcome { committed: true, initialized, used_essential_matrix: true };
            }
        }
    }

    // (c) at least one failed camera shares >= 3 points with the VP camera:
    // late-PnP is viable after triangulation, so keep just the VP camera.
    let late_pnp_viable =
        failed.iter().any(|&id| shared_point_count(&cameras[&vp_id], &cameras[&id]) >= MIN_SHARED_FOR_LATE_PNP);
    if late_pnp_viable {
        for &id in &remaining {
            if let Some(snap) = snapshots.get(&id) {
                if let Some(vp) = cameras.get_mut(&id) {
                    snap.restore(vp);
                }
            }
        }
        return FirstTierOutcome { committed: true, initialized: vec![vp_id], used_essential_matrix: false };
    }

    restore_all(cameras, &snapshots);
    none
}

fn run_essential_pair(cameras: &mut BTreeMap<CameraId, Viewpoint>, a: &CameraId, b: &CameraId) -> EvalOutcome {
    let mut cam_a = cameras.remove(a).expect("camera id must exist");
    let mut cam_b = cameras.remove(b).expect("camera id must exist");
    let outcome = try_essential_init(&mut cam_a, &mut cam_b);
    cameras.insert(*a, cam_a);
    cameras.insert(*b, cam_b);
    outcome
}
