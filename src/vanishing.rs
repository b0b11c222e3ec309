//! Vanishing-point extraction (spec §4.3, component C3).
//!
//! For each viewpoint and each axis, aggregates the viewpoint's explicit
//! `VanishingLine`s tagged for that axis with the *virtual* vanishing-lines
//! implied by `Line`s whose `direction` hint maps onto that axis (skipping
//! any line missing an image-point observation for either endpoint in this
//! viewpoint). Explicit and virtual lines are weighted equally — left as a
//! tunable per spec §9's open question, default equal weight.

use std::collections::BTreeMap;

use crate::linalg::eigen::smallest_singular_vector;
use crate::types::ids::LineId;
use crate::types::{Axis, Line, Viewpoint};

/// A vanishing point in pixel space, plus how it was derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VanishingPoint {
    pub pixel: (f64, f64),
    pub axis: Axis,
    pub line_count: usize,
}

#[derive(Debug, Clone)]
pub struct VanishingPointSet {
    pub points: BTreeMap<Axis, VanishingPoint>,
    pub warnings: Vec<String>,
}

impl VanishingPointSet {
    #[must_use]
    pub fn get(&self, axis: Axis) -> Option<&VanishingPoint> {
        self.points.get(&axis)
    }
}

/// Two pixel-space endpoints making up one contribution to an axis's VP fit.
#[derive(Debug, Clone, Copy)]
struct PixelLine {
    p1: (f64, f64),
    p2: (f64, f64),
}

/// Homogeneous line through two pixel points: `cross(p1_h, p2_h)`.
fn homogeneous_line(line: PixelLine) -> [f64; 3] {
    let a = [line.p1.0, line.p1.1, 1.0];
    let b = [line.p2.0, line.p2.1, 1.0];
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Closed-form intersection of exactly two homogeneous lines via cross
/// product. Returns `None` if the resulting homogeneous `w` is below 1e-10
/// (the lines are parallel in the image, i.e. the vanishing point is at
/// infinity).
fn intersect_two(l1: [f64; 3], l2: [f64; 3]) -> Option<(f64, f64)> {
    let h = [
        l1[1] * l2[2] - l1[2] * l2[1],
        l1[2] * l2[0] - l1[0] * l2[2],
        l1[0] * l2[1] - l1[1] * l2[0],
    ];
    if h[2].abs() < 1e-10 {
        return None;
    }
    Some((h[0] / h[2], h[1] / h[2]))
}

/// Over-determined intersection of >=2 homogeneous lines: solve `Ax=0` via
/// the kernel's inverse-power-iteration nullspace solver.
fn intersect_many(lines: &[[f64; 3]]) -> Option<(f64, f64)> {
    let rows: Vec<Vec<f64>> = lines.iter().map(|l| l.to_vec()).collect();
    let h = smallest_singular_vector(&rows)?;
    if h[2].abs() < 1e-10 {
        return None;
    }
    Some((h[0] / h[2], h[1] / h[2]))
}

/// Gathers explicit + virtual pixel-space lines feeding one axis's VP fit
/// in one viewpoint.
fn lines_for_axis(lines: &BTreeMap<LineId, Line>, viewpoint: &Viewpoint, axis: Axis) -> Vec<PixelLine> {
    let mut out: Vec<PixelLine> = viewpoint
        .vanishing_lines_for_axis(axis)
        .into_iter()
        .map(|l| PixelLine { p1: l.p1, p2: l.p2 })
        .collect();

    for line in lines.values() {
        if line.direction.vp_axis() != Some(axis) {
            continue;
        }
        if let Some(pl) = virtual_line_for(viewpoint, line) {
            out.push(pl);
        }
    }

    out
}

fn virtual_line_for(viewpoint: &Viewpoint, line: &Line) -> Option<PixelLine> {
    let a = viewpoint.observation_of(line.point_a)?;
    let b = viewpoint.observation_of(line.point_b)?;
    Some(PixelLine { p1: (a.u, a.v), p2: (b.u, b.v) })
}

/// Extract all available vanishing points for one viewpoint.
#[must_use]
pub fn extract_vanishing_points(lines: &BTreeMap<LineId, Line>, viewpoint: &Viewpoint) -> VanishingPointSet {
    let mut points = BTreeMap::new();
    let mut warnings = Vec::new();

    for axis in Axis::ALL {
        let pixel_lines = lines_for_axis(lines, viewpoint, axis);
        match pixel_lines.len() {
            0 => continue,
            1 => {
                warnings.push(format!(
                    "camera {}: only one vanishing-line for axis {:?}, cannot fit a vanishing point",
                    viewpoint.id, axis
                ));
            }
            2 => {
                let homog: Vec<[f64; 3]> = pixel_lines.iter().map(|l| homogeneous_line(*l)).collect();
                if let Some(pixel) = intersect_two(homog[0], homog[1]) {
                    points.insert(axis, VanishingPoint { pixel, axis, line_count: 2 });
                } else {
                    warnings.push(format!(
                        "camera {}: vanishing-lines for axis {:?} are parallel in the image (point at infinity)",
                        viewpoint.id, axis
                    ));
                }
            }
            n => {
                let homog: Vec<[f64; 3]> = pixel_lines.iter().map(|l| homogeneous_line(*l)).collect();
                if let Some(pixel) = intersect_many(&homog) {
                    points.insert(axis, VanishingPoint { pixel, axis, line_count: n });
                } else {
                    warnings.push(format!(
                        "camera {}: failed to fit a vanishing point for axis {:?} from {n} lines",
                        viewpoint.id, axis
                    ));
                }
            }
        }
    }

    warnings.extend(validate_orthogonality(viewpoint, &points));

    VanishingPointSet { points, warnings }
}

/// Flags a warning if the angle between any two VP->principal-point rays
/// falls outside [85 deg, 95 deg] (spec §4.3).
fn validate_orthogonality(viewpoint: &Viewpoint, points: &BTreeMap<Axis, VanishingPoint>) -> Vec<String> {
    let (cx, cy) = viewpoint.intrinsics.principal_point;
    let axes: Vec<&VanishingPoint> = points.values().collect();
    let mut warnings = Vec::new();

    for i in 0..axes.len() {
        for j in (i + 1)..axes.len() {
            let a = axes[i];
            let b = axes[j];
            let va = (a.pixel.0 - cx, a.pixel.1 - cy);
            let vb = (b.pixel.0 - cx, b.pixel.1 - cy);
            let dot = va.0 * vb.0 + va.1 * vb.1;
            let na = (va.0 * va.0 + va.1 * va.1).sqrt();
            let nb = (vb.0 * vb.0 + vb.1 * vb.1).sqrt();
            if na < 1e-9 || nb < 1e-9 {
                continue;
            }
            let cos_angle = (dot / (na * nb)).clamp(-1.0, 1.0);
            let angle_deg = cos_angle.acos().to_degrees();
            if !(85.0..=95.0).contains(&angle_deg) {
                warnings.push(format!(
                    "camera {}: VP({:?})-VP({:?}) angle at principal point is {angle_deg:.1} deg, outside [85,95]",
                    viewpoint.id, a.axis, b.axis
                ));
            }
        }
    }
    warnings
}
