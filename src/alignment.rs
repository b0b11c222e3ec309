//! Frame alignment (spec §4.7, component C7): after initialization leaves
//! an internally-consistent but possibly arbitrarily-scaled/rotated/placed
//! frame, rescale, rotate, and translate the whole scene so it matches the
//! user's world — the scale/orientation/origin the user actually meant by
//! their anchors, scale constraints, and axis-aligned lines.

use std::collections::BTreeMap;

use crate::linalg::mat3::{cross3, normalize3, sub3, Mat3, Vec3};
use crate::linalg::Quaternion;
use crate::types::constraint::ConstraintKind;
use crate::types::ids::{CameraId, LineId, PointId};
use crate::types::{Axis, Constraint, Line, Viewpoint, WorldPoint};

/// What alignment actually did, for diagnostics (spec §6 `alignment_quality`).
#[derive(Debug, Clone, Default)]
pub struct AlignmentReport {
    pub scale_applied: Option<f64>,
    pub rotation_applied: bool,
    pub translation_applied: Vec3,
    /// Mean residual distance, in world units, between each anchor used for
    /// translation and its target after the full alignment — lower is
    /// better, 0.0 when there were no anchors to check against.
    pub alignment_quality: f64,
}

/// Run scale, then rotation, then translation against the current
/// (post-orchestration) camera poses and world-point positions, mutating
/// both in place.
#[must_use]
pub fn align(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    world_points: &mut BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    constraints: &[Constraint],
) -> AlignmentReport {
    let mut report = AlignmentReport::default();

    report.scale_applied = apply_scale(cameras, world_points, lines, constraints);
    report.rotation_applied = apply_rotation(cameras, world_points, lines);
    report.translation_applied = apply_translation(cameras, world_points, constraints);
    report.alignment_quality = anchor_residual(world_points, constraints);

    report
}

fn point_xyz(world_points: &BTreeMap<PointId, WorldPoint>, id: PointId) -> Option<Vec3> {
    world_points.get(&id).map(WorldPoint::effective_or_optimized)
}

/// Find a scale reference (a `Distance` constraint, or a `Line` with
/// `target_length`, involving at least one free point) and rescale every
/// free coordinate — camera positions and unlocked world-point axes — by
/// `target / current`. Locked points are already in true world units and
/// are left untouched; they're exactly what makes a reference useful.
fn apply_scale(
    cameras: &mut BTreeMap<CameraId, Viewpoint>,
    world_points: &mut BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    constraints: &[Constraint],
) -> Option<f64> {
    let mut reference = None;

    for constraint in constraints.iter().filter(|c| c.enabled) {
        if let ConstraintKind::Distance { point_a, point_b, target } = &constraint.kind {
            if let (Some(a), Some(b)) = (point_xyz(world_points, *point_a), point_xyz(world_points, *point_b)) {
                let current = distance(&a, &b);
                if current > 1e-9 {
                    reference = Some((current, *target));
                    break;
                }
            }
        }
    }

    if reference.is_none() {
        for line in lines.values() {
            let Some(target) = line.target_length else { continue };
            if let (Some(a), Some(b)) = (point_xyz(world_points, line.point_a), point_xyz(world_points, line.point_b)) {
                let current = distance(&a, &b);
                if current > 1e-9 {
                    reference = Some((current, target));
                    break;
                }
            }
        }
    }

    let (current, target) = reference?;
    let ratio = target / current;
    if (ratio - 1.0).abs() < 1e-9 {
        return Some(ratio);
    }

    for camera in cameras.values_mut() {
        camera.extrinsics.position = scale_vec(&camera.extrinsics.position, ratio);
    }
    for point in world_points.values_mut() {
        let scaled = scale_vec(&point.optimized_xyz, ratio);
        for axis in 0..3 {
            if !point.locked[axis].is_locked() {
                point.optimized_xyz[axis] = scaled[axis];
            }
        }
    }

    Some(ratio)
}

fn distance(a: &Vec3, b: &Vec3) -> f64 {
    let d = sub3(a, b);
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

fn scale_vec(v: &Vec3, s: f64) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

fn columns_to_matrix(x: Vec3, y: Vec3, z: Vec3) -> Mat3 {
    [[x[0], y[0], z[0]], [x[1], y[1], z[1]], [x[2], y[2], z[2]]]
}

fn transpose(m: Mat3) -> Mat3 {
    [[m[0][0], m[1][0], m[2][0]], [m[0][1], m[1][1], m[2][1]], [m[0][2], m[1][2], m[2][2]]]
}

/// Average direction (point_b - point_a, or its negation, whichever
/// direction was recorded first) of every line tagged to `axis`, in the
/// current frame.
fn axis_direction(lines: &BTreeMap<LineId, Line>, world_points: &BTreeMap<PointId, WorldPoint>, axis: Axis) -> Option<Vec3> {
    let mut sum = [0.0; 3];
    let mut count = 0;
    let mut reference: Option<Vec3> = None;

    for line in lines.values() {
        if line.direction.vp_axis() != Some(axis) {
            continue;
        }
        let (Some(a), Some(b)) = (point_xyz(world_points, line.point_a), point_xyz(world_points, line.point_b)) else {
            continue;
        };
        let mut dir = normalize3(&sub3(&b, &a));
        if let Some(r) = reference {
            if dot(&dir, &r) < 0.0 {
                dir = [-dir[0], -dir[1], -dir[2]];
            }
        } else {
            reference = Some(dir);
        }
        sum = [sum[0] + dir[0], sum[1] + dir[1], sum[2] + dir[2]];
        count += 1;
    }

    if count == 0 {
        return None;
    }
    Some(normalize3(&[sum[0] / count as f64, sum[1] / count as f64, sum[2] / count as f64]))
}

fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Build a world-aligning rotation from whichever axis-direction hints are
/// available. Returns every viable candidate — exactly one with all three
/// axes, two when exactly two are available (matching `pose::rotation`'s
/// chirality-ambiguity handling for the cross-product-derived third axis),
/// none with fewer than two.
fn rotation_candidates(dirs: &BTreeMap<Axis, Vec3>) -> Vec<Quaternion> {
    let x = dirs.get(&Axis::X).copied();
    let y = dirs.get(&Axis::Y).copied();
    let z = dirs.get(&Axis::Z).copied();

    let mut matrices = Vec::new();
    match (x, y, z) {
        (Some(x), Some(y), Some(z)) => matrices.push(columns_to_matrix(x, y, z)),
        (Some(x), None, Some(z)) => {
            matrices.push(columns_to_matrix(x, normalize3(&cross3(&z, &x)), z));
            matrices.push(columns_to_matrix(x, normalize3(&cross3(&x, &z)), z));
        }
        (None, Some(y), Some(z)) => {
            matrices.push(columns_to_matrix(normalize3(&cross3(&y, &z)), y, z));
            matrices.push(columns_to_matrix(normalize3(&cross3(&z, &y)), y, z));
        }
        (Some(x), Some(y), None) => {
            matrices.push(columns_to_matrix(x, y, normalize3(&cross3(&x, &y))));
            matrices.push(columns_to_matrix(x, y, normalize3(&cross3(&y, &x))));
        }
        _ => return Vec::new(),
    }

    // `matrices`' columns are the current-frame directions that should land
    // on the standard basis; the aligning rotation is the inverse of that
    // basis change, i.e. its transpose (the columns are orthonormal).
    matrices.into_iter().map(|m| Quaternion::from_rotation_matrix(&transpose(m))).collect()
}

/// Sum of squared distances between each locked point's current position
/// and itself after applying `rotation` about the origin — used to choose
/// among rotation candidates sharing the same axis hints (spec §4.7
/// "pick whichever minimizes locked-point residuals").
fn candidate_residual(world_points: &BTreeMap<PointId, WorldPoint>, rotation: Quaternion) -> f64 {
    world_points
        .values()
        .filter(|p| p.fully_constrained())
        .map(|p| {
            let current = p.optimized_xyz;
            let rotated = rotation.rotate_vector(current);
            let target = p.effective_or_optimized();
            let d = sub3(&rotated, &target);
            d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
        })
        .sum()
}

fn apply_rotation(cameras: &mut BTreeMap<CameraId, Viewpoint>, world_points: &mut BTreeMap<PointId, WorldPoint>, lines: &BTreeMap<LineId, Line>) -> bool {
    let mut dirs = BTreeMap::new();
    for axis in Axis::ALL {
        if let Some(d) = axis_direction(lines, world_points, axis) {
            dirs.insert(axis, d);
        }
    }

    let candidates = rotation_candidates(&dirs);
    let Some(rotation) = (if candidates.len() <= 1 {
        candidates.into_iter().next()
    } else {
        candidates.into_iter().min_by(|a, b| candidate_residual(world_points, *a).total_cmp(&candidate_residual(world_points, *b)))
    }) else {
        return false;
    };

    for camera in cameras.values_mut() {
        camera.extrinsics.rotation = rotation.multiply(camera.extrinsics.rotation);
        camera.extrinsics.position = rotation.rotate_vector(camera.extrinsics.position);
    }
    for point in world_points.values_mut() {
        let rotated = rotation.rotate_vector(point.optimized_xyz);
        for axis in 0..3 {
            if !point.locked[axis].is_locked() {
                point.optimized_xyz[axis] = rotated[axis];
            }
        }
    }

    true
}

/// Anchors for translation: every `FixedPoint` constraint's target axes,
/// plus every locked point's own locked axes (a no-op target, but harmless
/// to include and keeps `anchor_residual` meaningful even when the only
/// anchors are locked points).
fn translation_anchors(world_points: &BTreeMap<PointId, WorldPoint>, constraints: &[Constraint]) -> Vec<(Vec3, [Option<f64>; 3])> {
    let mut anchors = Vec::new();

    for constraint in constraints.iter().filter(|c| c.enabled) {
        if let ConstraintKind::FixedPoint { point, target } = &constraint.kind {
            if let Some(current) = point_xyz(world_points, *point) {
                anchors.push((current, target.as_array()));
            }
        }
    }
    for point in world_points.values() {
        if point.fully_constrained() {
            let locked: [Option<f64>; 3] = std::array::from_fn(|axis| point.locked[axis].value());
            anchors.push((point.optimized_xyz, locked));
        }
    }

    anchors
}

fn apply_translation(cameras: &mut BTreeMap<CameraId, Viewpoint>, world_points: &mut BTreeMap<PointId, WorldPoint>, constraints: &[Constraint]) -> Vec3 {
    let anchors = translation_anchors(world_points, constraints);
    let mut sum = [0.0; 3];
    let mut count = [0usize; 3];

    for (current, target) in &anchors {
        for axis in 0..3 {
            if let Some(t) = target[axis] {
                sum[axis] += t - current[axis];
                count[axis] += 1;
            }
        }
    }

    let delta: Vec3 = std::array::from_fn(|axis| if count[axis] > 0 { sum[axis] / count[axis] as f64 } else { 0.0 });
    if delta.iter().all(|d| d.abs() < 1e-12) {
        return delta;
    }

    for camera in cameras.values_mut() {
        camera.extrinsics.position = [
            camera.extrinsics.position[0] + delta[0],
            camera.extrinsics.position[1] + delta[1],
            camera.extrinsics.position[2] + delta[2],
        ];
    }
    for point in world_points.values_mut() {
        for axis in 0..3 {
            if !point.locked[axis].is_locked() {
                point.optimized_xyz[axis] += delta[axis];
            }
        }
    }

    delta
}

fn anchor_residual(world_points: &BTreeMap<PointId, WorldPoint>, constraints: &[Constraint]) -> f64 {
    let anchors = translation_anchors(world_points, constraints);
    if anchors.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    let mut n = 0usize;
    for (current, target) in &anchors {
        for axis in 0..3 {
            if let Some(t) = target[axis] {
                total += (t - current[axis]).abs();
                n += 1;
            }
        }
    }
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}
