//! `try-vp-init` (spec §4.5): vanishing-point based initialization for one
//! camera.

use std::collections::BTreeMap;

use crate::linalg::mat3::normalize3;
use crate::pose::{focal_from_orthogonal_vps, resolve_sign_ambiguity, rotation_from_vps, ScoredPoint};
use crate::pose::{is_plausible_focal, mean_reprojection_error};
use crate::types::ids::{LineId, PointId};
use crate::types::{Axis, Line, Viewpoint, WorldPoint};
use crate::vanishing::extract_vanishing_points;

use super::{EvalOutcome, RELIABLE_REPROJECTION_ERROR_PX};

/// World-frame ray direction implied by a pixel observation, given only a
/// candidate rotation (the position is not yet known, so this is exactly
/// the "effective VP direction" step of rotation-from-VPs, reused here to
/// build the position solver's input).
fn world_ray_direction(u: f64, v: f64, principal_point: (f64, f64), focal_length: f64, rotation: crate::linalg::Quaternion) -> [f64; 3] {
    let (cx, cy) = principal_point;
    let camera_space = normalize3(&[(u - cx) / focal_length, (cy - v) / focal_length, 1.0]);
    normalize3(&rotation.inverse().rotate_vector(camera_space))
}

fn orthogonal_pair(vps: &BTreeMap<Axis, (f64, f64)>) -> Option<((f64, f64), (f64, f64))> {
    let preferred = [(Axis::X, Axis::Z), (Axis::X, Axis::Y), (Axis::Y, Axis::Z)];
    for (a, b) in preferred {
        if let (Some(&p1), Some(&p2)) = (vps.get(&a), vps.get(&b)) {
            return Some((p1, p2));
        }
    }
    None
}

/// Attempt VP-based initialization of `viewpoint`. `locked_point_count_global`
/// and `single_camera_scene` feed the skip rule from spec §4.5: skip if the
/// camera has no explicit vanishing-lines, fewer than 3 locked points exist
/// scene-wide, and this is a single-camera scene (late-PnP wins there).
#[must_use]
pub fn try_vp_init(
    lines: &BTreeMap<LineId, Line>,
    world_points: &BTreeMap<PointId, WorldPoint>,
    viewpoint: &mut Viewpoint,
    locked_point_count_global: usize,
    single_camera_scene: bool,
) -> EvalOutcome {
    const NAME: &str = "vp-init";

    if viewpoint.vanishing_lines.is_empty() && locked_point_count_global < 3 && single_camera_scene {
        return EvalOutcome::failed(NAME, "skipped: no explicit vanishing-lines, <3 locked points, single-camera scene");
    }

    let vp_set = extract_vanishing_points(lines, viewpoint);
    if vp_set.points.len() < 2 {
        return EvalOutcome::failed(NAME, "fewer than two vanishing-point axes available");
    }
    let vps: BTreeMap<Axis, (f64, f64)> = vp_set.points.iter().map(|(&a, v)| (a, v.pixel)).collect();

    let Some((vp1, vp2)) = orthogonal_pair(&vps) else {
        return EvalOutcome::failed(NAME, "no orthogonal vanishing-point pair available");
    };
    let principal_point = viewpoint.intrinsics.principal_point;
    let Some(focal) = focal_from_orthogonal_vps(vp1, vp2, principal_point) else {
        return EvalOutcome::failed(NAME, "negative focal-length radicand");
    };
    if !is_plausible_focal(focal, viewpoint.image_width) {
        return EvalOutcome::failed(NAME, "focal length outside plausible bounds");
    }

    let candidates = rotation_from_vps(&vps, principal_point, focal);
    if candidates.is_empty() {
        return EvalOutcome::failed(NAME, "rotation-from-VPs produced no candidates");
    }

    let anchored_points: Vec<ScoredPoint> = viewpoint
        .image_points
        .iter()
        .filter(|ip| ip.visible)
        .filter_map(|ip| {
            let point = world_points.get(&ip.world_point)?;
            if !point.anchored() {
                return None;
            }
            Some((ip, point.effective_or_optimized()))
        })
        .map(|(ip, xyz)| ScoredPoint { world_point: xyz, pixel: (ip.u, ip.v) })
        .collect();

    if anchored_points.len() < 2 {
        return EvalOutcome::failed(NAME, "fewer than two anchored points observed in this camera");
    }

    let mut best: Option<(crate::types::camera::Extrinsics, f64)> = None;
    for rotation in candidates {
        let intrinsics_candidate = {
            let mut intr = viewpoint.intrinsics;
            intr.focal_length = focal;
            intr
        };
        // Each even-parity sign flip tried inside `resolve_sign_ambiguity`
        // changes the camera-to-world ray directions, so position must be
        // re-solved per flipped rotation rather than once up front.
        let Some(resolved) = resolve_sign_ambiguity(rotation, &intrinsics_candidate, &anchored_points, |flipped_rotation| {
            let observations: Vec<crate::pose::PositionObservation> = anchored_points
                .iter()
                .map(|p| crate::pose::PositionObservation {
                    point: p.world_point,
                    ray_direction: world_ray_direction(p.pixel.0, p.pixel.1, principal_point, focal, flipped_rotation),
                })
                .collect();
            crate::pose::position_from_anchors(&observations)
        }) else {
            continue;
        };
        let err = mean_reprojection_error(&resolved, &intrinsics_candidate, &anchored_points);
        if best.as_ref().map_or(true, |(_, best_err)| err < *best_err) {
            best = Some((resolved, err));
        }
    }

    let Some((extrinsics, err)) = best else {
        return EvalOutcome::failed(NAME, "no rotation candidate yielded a valid position and sign resolution");
    };

    viewpoint.intrinsics.focal_length = focal;
    viewpoint.extrinsics = extrinsics;

    EvalOutcome::succeeded(NAME, err < RELIABLE_REPROJECTION_ERROR_PX, err)
}

/// Relaxed variant of `try_vp_init` (spec §4.6 Tier 2): usable with a single
/// anchored point plus an externally known `depth` (distance from the
/// camera center to that point along its ray) rather than the normal
/// two-or-more-anchor position solve. Used to VP-init the first camera of a
/// stepped-VP run when only one locked point is available scene-wide.
#[must_use]
pub fn try_vp_init_relaxed(
    lines: &BTreeMap<LineId, Line>,
    world_points: &BTreeMap<PointId, WorldPoint>,
    viewpoint: &mut Viewpoint,
    depth: f64,
) -> EvalOutcome {
    const NAME: &str = "vp-init-relaxed";

    let vp_set = extract_vanishing_points(lines, viewpoint);
    if vp_set.points.len() < 2 {
        return EvalOutcome::failed(NAME, "fewer than two vanishing-point axes available");
    }
    let vps: BTreeMap<Axis, (f64, f64)> = vp_set.points.iter().map(|(&a, v)| (a, v.pixel)).collect();

    let Some((vp1, vp2)) = orthogonal_pair(&vps) else {
        return EvalOutcome::failed(NAME, "no orthogonal vanishing-point pair available");
    };
    let principal_point = viewpoint.intrinsics.principal_point;
    let Some(focal) = focal_from_orthogonal_vps(vp1, vp2, principal_point) else {
        return EvalOutcome::failed(NAME, "negative focal-length radicand");
    };
    if !is_plausible_focal(focal, viewpoint.image_width) {
        return EvalOutcome::failed(NAME, "focal length outside plausible bounds");
    }

    let candidates = rotation_from_vps(&vps, principal_point, focal);
    if candidates.is_empty() {
        return EvalOutcome::failed(NAME, "rotation-from-VPs produced no candidates");
    }

    let anchored_point = viewpoint.image_points.iter().filter(|ip| ip.visible).find_map(|ip| {
        let point = world_points.get(&ip.world_point)?;
        if !point.anchored() {
            return None;
        }
        Some((ip.u, ip.v, point.effective_or_optimized()))
    });
    let Some((u, v, anchor)) = anchored_point else {
        return EvalOutcome::failed(NAME, "no anchored point observed in this camera");
    };
    let scored = [ScoredPoint { world_point: anchor, pixel: (u, v) }];

    let mut best: Option<(crate::types::camera::Extrinsics, f64)> = None;
    for rotation in candidates {
        let intrinsics_candidate = {
            let mut intr = viewpoint.intrinsics;
            intr.focal_length = focal;
            intr
        };
        let Some(resolved) = resolve_sign_ambiguity(rotation, &intrinsics_candidate, &scored, |flipped_rotation| {
            let ray = world_ray_direction(u, v, principal_point, focal, flipped_rotation);
            Some(crate::pose::position_from_single_anchor(anchor, ray, depth))
        }) else {
            continue;
        };
        let err = mean_reprojection_error(&resolved, &intrinsics_candidate, &scored);
        if best.as_ref().map_or(true, |(_, best_err)| err < *best_err) {
            best = Some((resolved, err));
        }
    }

    let Some((extrinsics, err)) = best else {
        return EvalOutcome::failed(NAME, "no rotation candidate yielded a valid sign resolution");
    };

    viewpoint.intrinsics.focal_length = focal;
    viewpoint.extrinsics = extrinsics;
    EvalOutcome::succeeded(NAME, err < RELIABLE_REPROJECTION_ERROR_PX, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::project::project;
    use crate::linalg::Quaternion;
    use crate::types::{CameraId, ImagePoint, ImagePointId, PointId, VanishingLine};

    #[test]
    fn recovers_a_simple_fronto_parallel_setup() {
        let true_extrinsics = crate::types::camera::Extrinsics { rotation: Quaternion::identity(), position: [0.0, 0.0, -5.0] };
        let intrinsics = crate::types::camera::Intrinsics::new(1000.0, (500.0, 500.0));

        let mut vp = Viewpoint::new(CameraId::new(0), "cam", 1000, 1000);
        vp.intrinsics.principal_point = (500.0, 500.0);

        // X axis vanishing lines: two horizontal lines converging far to the right
        vp.vanishing_lines.push(VanishingLine { p1: (200.0, 480.0), p2: (800.0, 495.0), axis: Axis::X });
        vp.vanishing_lines.push(VanishingLine { p1: (200.0, 520.0), p2: (800.0, 505.0), axis: Axis::X });
        // Z axis vanishing lines: two vertical-ish lines converging toward the principal point's horizon
        vp.vanishing_lines.push(VanishingLine { p1: (480.0, 200.0), p2: (495.0, 800.0), axis: Axis::Z });
        vp.vanishing_lines.push(VanishingLine { p1: (520.0, 200.0), p2: (505.0, 800.0), axis: Axis::Z });

        let a = crate::types::WorldPoint::new(PointId::new(0), "A").with_locked(0, 0.0).with_locked(1, 0.0).with_locked(2, 0.0);
        let b = crate::types::WorldPoint::new(PointId::new(1), "B").with_locked(0, 1.0).with_locked(1, 0.0).with_locked(2, 0.0);
        let mut world_points = BTreeMap::new();
        world_points.insert(PointId::new(0), a);
        world_points.insert(PointId::new(1), b);

        let (ua, va) = project(&[0.0, 0.0, 0.0], &intrinsics, &true_extrinsics).unwrap();
        let (ub, vb) = project(&[1.0, 0.0, 0.0], &intrinsics, &true_extrinsics).unwrap();
        vp.image_points.push(ImagePoint::new(ImagePointId::new(0), PointId::new(0), ua, va));
        vp.image_points.push(ImagePoint::new(ImagePointId::new(1), PointId::new(1), ub, vb));

        let lines: BTreeMap<LineId, Line> = BTreeMap::new();
        let outcome = try_vp_init(&lines, &world_points, &mut vp, 2, false);
        assert!(outcome.success, "{:?}", outcome.reason);
    }

    #[test]
    fn skip_rule_applies_to_single_camera_scenes_with_no_explicit_lines() {
        let mut vp = Viewpoint::new(CameraId::new(0), "cam", 1000, 1000);
        let lines: BTreeMap<LineId, Line> = BTreeMap::new();
        let world_points: BTreeMap<PointId, WorldPoint> = BTreeMap::new();
        let outcome = try_vp_init(&lines, &world_points, &mut vp, 0, true);
        assert!(!outcome.success);
        assert!(outcome.reason.unwrap().contains("skipped"));
    }
}
