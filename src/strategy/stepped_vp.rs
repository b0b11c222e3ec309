//! Tier 2 — stepped VP (spec §4.6): attempted only when Tier 1 committed
//! nothing, at least two cameras are uninitialized, VP-relaxed is possible
//! (at least one locked point exists scene-wide), and essential-matrix
//! scale is still undetermined. VP-init's first camera from a single
//! anchored point (absolute scale is arbitrary here; frame alignment,
//! `crate::alignment`, fixes it later from the user's scale reference),
//! then step the remaining cameras off it.

use std::collections::BTreeMap;

use crate::types::ids::{CameraId, LineId, PointId};
use crate::types::{Line, Viewpoint, WorldPoint};

use super::snapshot::CameraState;
use super::{shared_point_count, try_pnp_init, try_vp_init, try_vp_init_relaxed};

/// Scale used to seed the first camera's position in the single-anchor
/// relaxed VP solve. Arbitrary: frame alignment (C7) rescales the whole
/// scene against the user's actual scale reference afterward.
const RELAXED_SEED_DEPTH: f64 = 1.0;
const MIN_SHARED_FOR_STEP_VP: usize = 2;
const MIN_POINTS_FOR_PNP: usize = 3;
const MIN_CORRESPONDENCES_FOR_EM: usize = 7;

#[derive(Debug, Clone)]
pub struct SteppedVpOutcome {
    pub committed: bool,
    pub initialized: Vec<CameraId>,
    pub fallback_to_tier3: bool,
}

fn has_anchored_observation(viewpoint: &Viewpoint, world_points: &BTreeMap<PointId, WorldPoint>) -> bool {
    viewpoint.image_points.iter().filter(|ip| ip.visible).any(|ip| world_points.get(&ip.world_point).is_some_and(WorldPoint::anchored))
}

fn constrained_point_count(viewpoint: &Viewpoint, world_points: &BTreeMap<PointId, WorldPoint>) -> usize {
    viewpoint
        .image_points
        .iter()
        .filter(|ip| ip.visible)
        .filter(|ip| world_points.get(&ip.world_point).is_some_and(WorldPoint::fully_constrained))
        .count()
}

/// Run Tier 2 over `uninitialized` cameras. The relaxed single-anchor VP
/// solve needs at least one locked point scene-wide; with none at all,
/// this tier has nothing to offer and defers straight to Tier 3
/// (essential-matrix needs no anchor, only correspondences).
#[must_use]
pub fn run(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    world_points: &BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    uninitialized: &[CameraId],
    locked_point_count_global: usize,
) -> SteppedVpOutcome {
    let none = SteppedVpOutcome { committed: false, initialized: Vec::new(), fallback_to_tier3: false };
    if uninitialized.len() < 2 {
        return none;
    }
    if locked_point_count_global < 1 {
        return SteppedVpOutcome { committed: false, initialized: Vec::new(), fallback_to_tier3: true };
    }

    let Some(&first_id) = uninitialized.iter().find(|&&id| {
        cameras.get(&id).is_some_and(|vp| has_anchored_observation(vp, world_points))
    }) else {
        return none;
    };

    let snapshots: BTreeMap<CameraId, CameraState> =
        uninitialized.iter().map(|&id| (id, CameraState::capture(&cameras[&id]))).collect();

    let first_outcome = {
        let vp = cameras.get_mut(&first_id).expect("uninitialized camera id must exist");
        try_vp_init_relaxed(lines, world_points, vp, RELAXED_SEED_DEPTH)
    };
    if !first_outcome.success {
        return none;
    }

    let mut initialized = vec![first_id];
    let mut vp_camera_count = 1usize;
    let mut all_succeeded = true;

    for &id in uninitialized.iter().filter(|&&id| id != first_id) {
        let shared = cameras.get(&id).map(|vp| shared_point_count(&cameras[&first_id], vp)).unwrap_or(0);
        let constrained = cameras.get(&id).map(|vp| constrained_point_count(vp, world_points)).unwrap_or(0);

        let outcome = if shared >= MIN_SHARED_FOR_STEP_VP {
            let vp = cameras.get_mut(&id).expect("uninitialized camera id must exist");
            let o = try_vp_init(lines, world_points, vp, locked_point_count_global, false);
            if o.success {
                vp_camera_count += 1;
            }
            o
        } else if constrained >= MIN_POINTS_FOR_PNP {
            let vp = cameras.get_mut(&id).expect("uninitialized camera id must exist");
            try_pnp_init(world_points, vp)
        } else {
            super::EvalOutcome::failed("stepped-vp", "neither VP-step nor PnP is viable for this camera")
        };

        if outcome.success {
            initialized.push(id);
        } else {
            all_succeeded = false;
        }
    }

    if all_succeeded {
        return SteppedVpOutcome { committed: true, initialized, fallback_to_tier3: false };
    }

    if vp_camera_count >= 2 {
        return SteppedVpOutcome { committed: true, initialized, fallback_to_tier3: false };
    }

    let second_id = uninitialized.iter().find(|&&id| id != first_id).copied();
    let em_viable = second_id.is_some_and(|id| shared_point_count(&cameras[&first_id], &cameras[&id]) >= MIN_CORRESPONDENCES_FOR_EM);

    if em_viable {
        for &id in uninitialized {
            if let Some(snapshot) = snapshots.get(&id) {
                if let Some(vp) = cameras.get_mut(&id) {
                    snapshot.restore(vp);
                }
            }
        }
        return SteppedVpOutcome { committed: false, initialized: Vec::new(), fallback_to_tier3: true };
    }

    SteppedVpOutcome { committed: true, initialized, fallback_to_tier3: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ineligible_with_fewer_than_two_cameras() {
        let mut cameras = BTreeMap::new();
        cameras.insert(CameraId::new(0), Viewpoint::new(CameraId::new(0), "a", 800, 600));
        let world_points = BTreeMap::new();
        let lines = BTreeMap::new();
        let outcome = run(&mut cameras, &world_points, &lines, &[CameraId::new(0)], 1);
        assert!(!outcome.committed);
        assert!(!outcome.fallback_to_tier3);
    }

    #[test]
    fn no_locked_points_globally_defers_to_essential_matrix_tier() {
        let mut cameras = BTreeMap::new();
        cameras.insert(CameraId::new(0), Viewpoint::new(CameraId::new(0), "a", 800, 600));
        cameras.insert(CameraId::new(1), Viewpoint::new(CameraId::new(1), "b", 800, 600));
        let world_points = BTreeMap::new();
        let lines = BTreeMap::new();
        let outcome = run(&mut cameras, &world_points, &lines, &[CameraId::new(0), CameraId::new(1)], 0);
        assert!(!outcome.committed);
        assert!(outcome.fallback_to_tier3);
    }
}
