//! Initialization orchestrator (spec §4.6, component C6): the hardest
//! control-flow in the system. Ties the C5 strategy evaluators together
//! across three tiers plus a late-PnP completion pass, leaving every
//! camera either initialized or recorded as failed.

use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::ray::{camera_ray, triangulate};
use crate::pose::{solve_pnp_iterative, PnpObservation};
use crate::strategy::first_tier::FirstTierOutcome;
use crate::strategy::{first_tier, shared_point_count, single_camera, stepped_vp, try_essential_init};
use crate::types::camera::Intrinsics;
use crate::types::ids::{CameraId, LineId, PointId};
use crate::types::{Axis, Line, Viewpoint, WorldPoint};
use crate::vanishing::extract_vanishing_points;

/// Diagnostics emitted by a full orchestration run (spec §4.6).
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOutcome {
    pub used_essential_matrix: bool,
    pub stepped_vp_reverted: bool,
    pub vp_em_hybrid_applied: bool,
    pub strategy_per_camera: BTreeMap<CameraId, &'static str>,
    pub cameras_failed: Vec<CameraId>,
}

const MIN_POINTS_FOR_LATE_PNP: usize = 3;
const MIN_VALID_VPS_FOR_HYBRID: usize = 2;
const FALLBACK_TRIANGULATION_DEPTH: f64 = 5.0;

fn locked_point_count(world_points: &BTreeMap<PointId, WorldPoint>) -> usize {
    world_points.values().filter(|p| p.fully_constrained()).count()
}

/// Run the full initialization pipeline over every camera in `cameras`,
/// mutating poses/intrinsics in place and seeding `world_points`'
/// `optimized_xyz` for points triangulated along the way.
#[must_use]
pub fn run(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    world_points: &mut BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
) -> OrchestratorOutcome {
    let mut outcome = OrchestratorOutcome::default();
    let all_ids: Vec<CameraId> = cameras.keys().copied().collect();
    if all_ids.is_empty() {
        return outcome;
    }

    let locked = locked_point_count(world_points);

    if all_ids.len() == 1 {
        let id = all_ids[0];
        let single = single_camera::run(cameras, world_points, lines, id, locked);
        match single.strategy {
            Some(strategy) => {
                outcome.strategy_per_camera.insert(id, strategy);
            }
            None => outcome.cameras_failed.push(id),
        }
        return outcome;
    }

    let mut initialized: BTreeSet<CameraId> = BTreeSet::new();

    let tier1 = first_tier::run(cameras, world_points, lines, &all_ids, locked);
    if tier1.committed {
        log::debug!("tier 1 committed for {} camera(s)", tier1.initialized.len());
        record_tier1(&tier1, &mut outcome, &mut initialized);
    } else {
        log::debug!("tier 1 did not commit, falling back to stepped-vp");
        let tier2 = stepped_vp::run(cameras, world_points, lines, &all_ids, locked);
        if tier2.committed {
            for &id in &tier2.initialized {
                outcome.strategy_per_camera.insert(id, "stepped-vp");
                initialized.insert(id);
            }
        } else if tier2.fallback_to_tier3 {
            log::warn!("stepped-vp reverted, falling back to essential-matrix tier");
            outcome.stepped_vp_reverted = true;
            run_tier3(cameras, lines, &all_ids, &mut outcome, &mut initialized);
        }
    }

    let mut remaining: Vec<CameraId> = all_ids.iter().copied().filter(|id| !initialized.contains(id)).collect();
    if !remaining.is_empty() && initialized.len() >= 2 {
        triangulate_visible_points(cameras, world_points, &initialized);
        remaining.retain(|&id| {
            let succeeded = try_late_pnp(cameras, world_points, id);
            if succeeded {
                outcome.strategy_per_camera.insert(id, "late-pnp");
                initialized.insert(id);
            } else {
                log::warn!("late-pnp failed for camera {id:?}");
            }
            !succeeded
        });
    }

    outcome.cameras_failed.extend(remaining);
    if !outcome.cameras_failed.is_empty() {
        log::warn!("{} camera(s) left uninitialized after all tiers", outcome.cameras_failed.len());
    }
    outcome
}

/// Tier 1 committed: attribute a strategy label to each initialized
/// camera. The exact per-camera strategy isn't threaded back out of
/// `first_tier::run`, so this infers it from position in the initialized
/// list: the first is always the VP camera; if the rollback rule composed
/// an essential-matrix pose onto it (case b), the second is that EM
/// partner; everything else is a PnP success.
fn record_tier1(tier1: &FirstTierOutcome, outcome: &mut OrchestratorOutcome, initialized: &mut BTreeSet<CameraId>) {
    outcome.used_essential_matrix = tier1.used_essential_matrix;
    if tier1.used_essential_matrix {
        // The rollback rule's VP-rotation composition onto the
        // essential-matrix result (spec §4.6 Tier 1 case b) is the same
        // operation Tier 3's VP+EM hybrid performs; flag it the same way.
        outcome.vp_em_hybrid_applied = true;
    }
    for (i, &id) in tier1.initialized.iter().enumerate() {
        let strategy = if i == 0 {
            "vp-init"
        } else if tier1.used_essential_matrix && i == 1 {
            "essential-matrix"
        } else {
            "pnp-init"
        };
        outcome.strategy_per_camera.insert(id, strategy);
        initialized.insert(id);
    }
}

/// Tier 3 — essential-matrix fallback (spec §4.6): reset the first two
/// cameras' intrinsics to safe defaults, run essential-matrix between
/// them, then optionally apply the VP+EM hybrid rotation.
fn run_tier3(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    lines: &BTreeMap<LineId, Line>,
    all_ids: &[CameraId],
    outcome: &mut OrchestratorOutcome,
    initialized: &mut BTreeSet<CameraId>,
) {
    if all_ids.len() < 2 {
        return;
    }
    let (first, second) = (all_ids[0], all_ids[1]);

    if let Some(vp) = cameras.get_mut(&first) {
        vp.intrinsics = Intrinsics::safe_default(vp.image_width, vp.image_height);
    }
    if let Some(vp) = cameras.get_mut(&second) {
        vp.intrinsics = Intrinsics::safe_default(vp.image_width, vp.image_height);
    }

    let mut cam_a = cameras.remove(&first).expect("camera id must exist");
    let mut cam_b = cameras.remove(&second).expect("camera id must exist");
    let result = try_essential_init(&mut cam_a, &mut cam_b);
    cameras.insert(first, cam_a);
    cameras.insert(second, cam_b);

    if !result.success {
        return;
    }

    outcome.used_essential_matrix = true;
    outcome.strategy_per_camera.insert(first, "essential-matrix");
    outcome.strategy_per_camera.insert(second, "essential-matrix");
    initialized.insert(first);
    initialized.insert(second);

    if outcome.stepped_vp_reverted {
        // Stepped VP was reverted specifically because it couldn't commit
        // and an essential-matrix path looked viable; the hybrid's rotation
        // re-alignment only makes sense when nothing contradicts it.
        return;
    }

    apply_vp_em_hybrid(cameras, lines, first, second, outcome);
}

/// VP+EM hybrid (spec §4.6 Tier 3): if either camera has >=2 valid
/// vanishing points, re-estimate focal length from them (transferring to
/// the partner if it lacks its own), derive a rotation `q_vp`, and rotate
/// the pair's frame so camera `first` takes `q_vp` directly and camera
/// `second` takes `q_vp ⊗ q_em` (its essential-matrix rotation relative to
/// `first`, which essential-matrix init always places at the origin).
fn apply_vp_em_hybrid(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    lines: &BTreeMap<LineId, Line>,
    first: CameraId,
    second: CameraId,
    outcome: &mut OrchestratorOutcome,
) {
    let vp_sets: BTreeMap<CameraId, BTreeMap<Axis, (f64, f64)>> = [first, second]
        .iter()
        .filter_map(|&id| {
            let vp = cameras.get(&id)?;
            let set = extract_vanishing_points(lines, vp);
            Some((id, set.points.into_iter().map(|(axis, p)| (axis, p.pixel)).collect()))
        })
        .collect();

    let Some((&vp_camera_id, vps)) = vp_sets.iter().find(|(_, vps)| vps.len() >= MIN_VALID_VPS_FOR_HYBRID) else {
        return;
    };
    let other_id = if vp_camera_id == first { second } else { first };

    let principal_point = cameras[&vp_camera_id].intrinsics.principal_point;
    let mut axis_pixels = vps.iter();
    let Some((_, &vp1)) = axis_pixels.next() else { return };
    let Some((_, &vp2)) = axis_pixels.next() else { return };

    if let Some(new_focal) = crate::pose::focal::focal_from_orthogonal_vps(vp1, vp2, principal_point) {
        cameras.get_mut(&vp_camera_id).expect("vp camera must exist").intrinsics.focal_length = new_focal;
        let other_has_own_vps = vp_sets.get(&other_id).is_some_and(|v| v.len() >= MIN_VALID_VPS_FOR_HYBRID);
        if !other_has_own_vps {
            cameras.get_mut(&other_id).expect("other camera must exist").intrinsics.focal_length = new_focal;
        }
    }

    let focal_length = cameras[&vp_camera_id].intrinsics.focal_length;
    let candidates = crate::pose::rotation_from_vps(vps, principal_point, focal_length);
    let Some(&q_vp) = candidates.first() else { return };

    let vp_old_rotation = cameras[&vp_camera_id].extrinsics.rotation;
    let vp_old_position = cameras[&vp_camera_id].extrinsics.position;
    let other_old_rotation = cameras[&other_id].extrinsics.rotation;
    let other_old_position = cameras[&other_id].extrinsics.position;

    // Frame-alignment rotation: maps the essential-matrix frame (where
    // `vp_camera_id` has rotation `vp_old_rotation`) onto the VP-derived
    // absolute frame (where it has rotation `q_vp`). Works symmetrically
    // whichever of the EM pair the VP camera turned out to be — when it's
    // `try_essential_init`'s "first" (identity rotation by convention), this
    // reduces to `q_vp` itself; when it's "second", it's `q_vp` composed
    // with the inverse of that camera's own EM-frame rotation.
    let frame_rotation = q_vp.multiply(vp_old_rotation.inverse());

    if let Some(vp) = cameras.get_mut(&vp_camera_id) {
        vp.extrinsics.rotation = q_vp;
        vp.extrinsics.position = [0.0, 0.0, 0.0];
    }
    if let Some(other) = cameras.get_mut(&other_id) {
        other.extrinsics.rotation = frame_rotation.multiply(other_old_rotation);
        other.extrinsics.position =
            frame_rotation.rotate_vector(crate::linalg::mat3::sub3(&other_old_position, &vp_old_position));
    }

    outcome.vp_em_hybrid_applied = true;
}

/// Triangulate `optimized_xyz` for every world point visible (visibly
/// observed) by at least two already-initialized cameras and not already
/// fully constrained, so late-PnP below has a position to work from.
fn triangulate_visible_points(
    cameras: &BTreeMap<CameraId, Viewpoint>,
    world_points: &mut BTreeMap<PointId, WorldPoint>,
    initialized: &BTreeSet<CameraId>,
) {
    let mut observers: BTreeMap<PointId, Vec<CameraId>> = BTreeMap::new();
    for &id in initialized {
        let Some(vp) = cameras.get(&id) else { continue };
        for ip in vp.image_points.iter().filter(|ip| ip.visible) {
            observers.entry(ip.world_point).or_default().push(id);
        }
    }

    for (point_id, seen_by) in observers {
        let Some(point) = world_points.get(&point_id) else { continue };
        if point.fully_constrained() || seen_by.len() < 2 {
            continue;
        }
        let (cam_a_id, cam_b_id) = (seen_by[0], seen_by[1]);
        let cam_a = &cameras[&cam_a_id];
        let cam_b = &cameras[&cam_b_id];
        let (Some(obs_a), Some(obs_b)) = (cam_a.observation_of(point_id), cam_b.observation_of(point_id)) else {
            continue;
        };
        let ray1 = camera_ray(obs_a.u, obs_a.v, &cam_a.intrinsics, &cam_a.extrinsics);
        let ray2 = camera_ray(obs_b.u, obs_b.v, &cam_b.intrinsics, &cam_b.extrinsics);
        let triangulated = triangulate(&ray1, &ray2, FALLBACK_TRIANGULATION_DEPTH);

        if let Some(point) = world_points.get_mut(&point_id) {
            for axis in 0..3 {
                if !point.locked[axis].is_locked() {
                    point.optimized_xyz[axis] = triangulated[axis];
                    // anchored()/fully_constrained() must see this or
                    // try_late_pnp (which filters on anchored()) would never
                    // find a point this pass just established a position for.
                    point.set_inferred(axis, triangulated[axis]);
                }
            }
        }
    }
}

/// PnP against any point with an established position — fully constrained
/// or already triangulated — rather than `try_pnp_init`'s stricter
/// fully-constrained-only filter (spec §4.6 "after triangulation ... PnP
/// for more cameras").
fn try_late_pnp(cameras: &mut BTreeMap<CameraId, Viewpoint>, world_points: &BTreeMap<PointId, WorldPoint>, camera_id: CameraId) -> bool {
    let Some(viewpoint) = cameras.get(&camera_id) else { return false };

    let observations: Vec<PnpObservation> = viewpoint
        .image_points
        .iter()
        .filter(|ip| ip.visible)
        .filter_map(|ip| {
            let point = world_points.get(&ip.world_point)?;
            if !point.anchored() {
                return None;
            }
            Some(PnpObservation { point: point.effective_or_optimized(), pixel: (ip.u, ip.v) })
        })
        .collect();

    if observations.len() < MIN_POINTS_FOR_LATE_PNP {
        return false;
    }

    let Some(result) = solve_pnp_iterative(&observations, &viewpoint.intrinsics, viewpoint.extrinsics) else {
        return false;
    };

    cameras.get_mut(&camera_id).expect("camera id must exist").extrinsics = result.extrinsics;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::project::project;
    use crate::types::camera::Extrinsics;
    use crate::types::{ImagePoint, ImagePointId};

    #[test]
    fn empty_scene_yields_no_cameras_failed_or_initialized() {
        let mut cameras = BTreeMap::new();
        let mut world_points = BTreeMap::new();
        let lines = BTreeMap::new();
        let outcome = run(&mut cameras, &mut world_points, &lines);
        assert!(outcome.strategy_per_camera.is_empty());
        assert!(outcome.cameras_failed.is_empty());
    }

    #[test]
    fn single_camera_scene_delegates_to_single_camera_strategy() {
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

        let outcome = run(&mut cameras, &mut world_points, &lines);
        assert_eq!(outcome.strategy_per_camera.get(&CameraId::new(0)), Some(&"pnp-init"));
    }
}
