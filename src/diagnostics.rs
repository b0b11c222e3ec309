//! Diagnostics & validation (spec §4.10, component C10): pre-solve sanity
//! checks, post-solve per-constraint residual severity, and isolated-point
//! detection.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;
use crate::residuals::{constraints as cres, Dual};
use crate::types::constraint::ConstraintKind;
use crate::types::ids::{CameraId, ConstraintId, LineId, PointId};
use crate::types::{Constraint, Line, Viewpoint, WorldPoint};

/// Severity band for a constraint's post-solve residual, by relative
/// magnitude (spec §4.10: critical >20%, high >5%, medium >1%, warning
/// >0.1%). Residuals at or below 0.1% aren't reported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Medium,
    High,
    Critical,
}

const CRITICAL_THRESHOLD: f64 = 0.20;
const HIGH_THRESHOLD: f64 = 0.05;
const MEDIUM_THRESHOLD: f64 = 0.01;
const WARNING_THRESHOLD: f64 = 0.001;

fn classify(relative: f64) -> Option<Severity> {
    let a = relative.abs();
    if a > CRITICAL_THRESHOLD {
        Some(Severity::Critical)
    } else if a > HIGH_THRESHOLD {
        Some(Severity::High)
    } else if a > MEDIUM_THRESHOLD {
        Some(Severity::Medium)
    } else if a > WARNING_THRESHOLD {
        Some(Severity::Warning)
    } else {
        None
    }
}

/// One constraint's post-solve residual report.
#[derive(Debug, Clone)]
pub struct ConstraintResidual {
    pub constraint: ConstraintId,
    /// Worst sub-residual this constraint produced, in its native unit
    /// (world distance, radians, or a unitless direction measure).
    pub residual: f64,
    /// `residual` scaled against the constraint's own target magnitude;
    /// constraints with no natural target (parallel/perpendicular/
    /// collinear/coplanar) use their already-unitless residual directly.
    pub relative: f64,
    pub severity: Option<Severity>,
}

/// Reject before solving if there is nothing at all to anchor the scene:
/// no enabled constraints and no visible reprojection observations.
pub fn check_before_solve(cameras: &BTreeMap<CameraId, Viewpoint>, constraints: &[Constraint]) -> Result<(), Error> {
    let has_constraints = constraints.iter().any(|c| c.enabled);
    let has_observations = cameras.values().any(|c| c.image_points.iter().any(|ip| ip.visible));
    if !has_constraints && !has_observations {
        log::warn!("rejecting scene: no enabled constraints and no reprojection observations");
        return Err(Error::InsufficientConstraints(
            "no enabled constraints and no reprojection observations".into(),
        ));
    }
    Ok(())
}

/// Number of scalar residuals an enabled constraint contributes, by its
/// structural arity alone (no world-point lookups needed).
fn residual_count(kind: &ConstraintKind) -> usize {
    match kind {
        ConstraintKind::FixedPoint { target, .. } => target.as_array().iter().filter(|v| v.is_some()).count(),
        ConstraintKind::Distance { .. } | ConstraintKind::Angle { .. } | ConstraintKind::ParallelLines { .. } | ConstraintKind::PerpendicularLines { .. } => 1,
        ConstraintKind::CollinearPoints { points } => points.len().saturating_sub(2),
        ConstraintKind::CoplanarPoints { points } => points.len().saturating_sub(3),
        ConstraintKind::EqualDistances { pairs } => pairs.len().saturating_sub(1),
        ConstraintKind::EqualAngles { triplets } => triplets.len().saturating_sub(1),
    }
}

/// Total scalar residual count contributed by every enabled constraint.
#[must_use]
pub fn constraint_residual_count(constraints: &[Constraint]) -> usize {
    constraints.iter().filter(|c| c.enabled).map(|c| residual_count(&c.kind)).sum()
}

/// Signed degrees of freedom: `3*unlocked_points + 7*cameras -
/// constraint_residual_count`. Positive means the system is
/// under-determined (gauge or shape freedom remains); negative means
/// over-determined (residuals outnumber free parameters, which is normal
/// and often desirable for a least-squares solve). This is a diagnostic
/// count, not a pass/fail verdict.
#[must_use]
pub fn degrees_of_freedom(world_points: &BTreeMap<PointId, WorldPoint>, cameras: &BTreeMap<CameraId, Viewpoint>, constraints: &[Constraint]) -> i64 {
    let unlocked_points = world_points.values().filter(|p| !p.fully_constrained()).count();
    3 * unlocked_points as i64 + 7 * cameras.len() as i64 - constraint_residual_count(constraints) as i64
}

fn dual_point(xyz: [f64; 3]) -> [Dual; 3] {
    [Dual::constant(xyz[0], 0), Dual::constant(xyz[1], 0), Dual::constant(xyz[2], 0)]
}

fn worst_abs(residuals: &[Dual]) -> Option<f64> {
    residuals.iter().map(|r| r.value.abs()).fold(None, |acc, r| Some(acc.map_or(r, |a: f64| a.max(r))))
}

/// Evaluate one constraint's current residual(s) and return the worst
/// sub-residual alongside the scale to measure it relative to.
fn evaluate_one(kind: &ConstraintKind, lines: &BTreeMap<LineId, Line>, xyz_of: &dyn Fn(PointId) -> [Dual; 3]) -> Option<(f64, f64)> {
    match kind {
        ConstraintKind::FixedPoint { point, target } => {
            let residuals = cres::fixed_point(&xyz_of(*point), target.as_array());
            let mut worst: Option<(f64, f64)> = None;
            let mut i = 0;
            for t in target.as_array() {
                let Some(t) = t else { continue };
                let r = residuals[i].value.abs();
                let scale = t.abs().max(1e-6);
                if worst.map_or(true, |(wr, _)| r > wr) {
                    worst = Some((r, scale));
                }
                i += 1;
            }
            worst
        }
        ConstraintKind::Distance { point_a, point_b, target } => {
            let d = cres::distance(&xyz_of(*point_a), &xyz_of(*point_b), *target);
            Some((d.value.abs(), target.abs().max(1e-9)))
        }
        ConstraintKind::Angle { point_a, vertex, point_c, target_degrees } => {
            let target_radians = target_degrees.to_radians();
            let a = cres::angle(&xyz_of(*point_a), &xyz_of(*vertex), &xyz_of(*point_c), target_radians);
            Some((a.value.abs(), target_radians.abs().max(1e-9)))
        }
        ConstraintKind::ParallelLines { line_a, line_b } => {
            let (la, lb) = (lines.get(line_a)?, lines.get(line_b)?);
            let r = cres::parallel_lines(&cres::line_direction(la, xyz_of), &cres::line_direction(lb, xyz_of));
            Some((r.value.abs(), 1.0))
        }
        ConstraintKind::PerpendicularLines { line_a, line_b } => {
            let (la, lb) = (lines.get(line_a)?, lines.get(line_b)?);
            let r = cres::perpendicular_lines(&cres::line_direction(la, xyz_of), &cres::line_direction(lb, xyz_of));
            Some((r.value.abs(), 1.0))
        }
        ConstraintKind::CollinearPoints { points } => {
            let xs: Vec<_> = points.iter().map(|&id| xyz_of(id)).collect();
            worst_abs(&cres::collinear_points(&xs)).map(|worst| (worst, 1.0))
        }
        ConstraintKind::CoplanarPoints { points } => {
            let xs: Vec<_> = points.iter().map(|&id| xyz_of(id)).collect();
            worst_abs(&cres::coplanar_points(&xs)).map(|worst| (worst, 1.0))
        }
        ConstraintKind::EqualDistances { pairs } => {
            if pairs.len() < 2 {
                return None;
            }
            let dists: Vec<Dual> = pairs.iter().map(|(a, b)| cres::distance(&xyz_of(*a), &xyz_of(*b), 0.0)).collect();
            let base = dists[0].value.abs().max(1e-9);
            worst_abs(&cres::equal_distances(&dists)).map(|worst| (worst, base))
        }
        ConstraintKind::EqualAngles { triplets } => {
            if triplets.len() < 2 {
                return None;
            }
            let angles: Vec<Dual> = triplets.iter().map(|(a, v, c)| cres::angle(&xyz_of(*a), &xyz_of(*v), &xyz_of(*c), 0.0)).collect();
            let base = angles[0].value.abs().max(1e-9);
            worst_abs(&cres::equal_angles(&angles)).map(|worst| (worst, base))
        }
    }
}

/// Post-solve per-constraint severity report (spec §4.10).
#[must_use]
pub fn evaluate_constraint_residuals(
    world_points: &BTreeMap<PointId, WorldPoint>,
    lines: &BTreeMap<LineId, Line>,
    constraints: &[Constraint],
) -> Vec<ConstraintResidual> {
    let xyz_of = |id: PointId| -> [Dual; 3] {
        world_points.get(&id).map(|p| dual_point(p.effective_or_optimized())).unwrap_or_else(|| dual_point([0.0; 3]))
    };

    constraints
        .iter()
        .filter(|c| c.enabled)
        .filter_map(|c| {
            let (residual, scale) = evaluate_one(&c.kind, lines, &xyz_of)?;
            let relative = residual / scale;
            Some(ConstraintResidual { constraint: c.id, residual, relative, severity: classify(relative) })
        })
        .collect()
}

/// Points that no enabled constraint references — likely either purely
/// observational (reprojection-only) or genuinely orphaned.
#[must_use]
pub fn isolated_points(world_points: &BTreeMap<PointId, WorldPoint>, constraints: &[Constraint]) -> Vec<PointId> {
    let mut referenced: BTreeSet<PointId> = BTreeSet::new();
    for c in constraints.iter().filter(|c| c.enabled) {
        match &c.kind {
            ConstraintKind::FixedPoint { point, .. } => {
                referenced.insert(*point);
            }
            ConstraintKind::Distance { point_a, point_b, .. } => {
                referenced.insert(*point_a);
                referenced.insert(*point_b);
            }
            ConstraintKind::Angle { point_a, vertex, point_c, .. } => {
                referenced.insert(*point_a);
                referenced.insert(*vertex);
                referenced.insert(*point_c);
            }
            ConstraintKind::ParallelLines { .. } | ConstraintKind::PerpendicularLines { .. } => {}
            ConstraintKind::CollinearPoints { points } | ConstraintKind::CoplanarPoints { points } => {
                referenced.extend(points.iter().copied());
            }
            ConstraintKind::EqualDistances { pairs } => {
                for (a, b) in pairs {
                    referenced.insert(*a);
                    referenced.insert(*b);
                }
            }
            ConstraintKind::EqualAngles { triplets } => {
                for (a, v, c) in triplets {
                    referenced.insert(*a);
                    referenced.insert(*v);
                    referenced.insert(*c);
                }
            }
        }
    }
    world_points.keys().copied().filter(|id| !referenced.contains(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::{CameraId, ConstraintId};
    use crate::types::Viewpoint;

    #[test]
    fn rejects_scene_with_no_constraints_and_no_observations() {
        let cameras: BTreeMap<CameraId, Viewpoint> = BTreeMap::new();
        let constraints: Vec<Constraint> = Vec::new();
        assert!(check_before_solve(&cameras, &constraints).is_err());
    }

    #[test]
    fn accepts_scene_with_a_reprojection_observation() {
        use crate::types::{ImagePoint, ImagePointId};
        let mut vp = Viewpoint::new(CameraId::new(0), "cam", 100, 100);
        vp.image_points.push(ImagePoint::new(ImagePointId::new(0), PointId::new(0), 10.0, 10.0));
        let mut cameras = BTreeMap::new();
        cameras.insert(CameraId::new(0), vp);
        let constraints: Vec<Constraint> = Vec::new();
        assert!(check_before_solve(&cameras, &constraints).is_ok());
    }

    #[test]
    fn classifies_a_grossly_violated_distance_constraint_as_critical() {
        let mut world_points = BTreeMap::new();
        let a = PointId::new(0);
        let b = PointId::new(1);
        let mut pa = WorldPoint::new(a, "a");
        pa.optimized_xyz = [0.0, 0.0, 0.0];
        let mut pb = WorldPoint::new(b, "b");
        pb.optimized_xyz = [2.0, 0.0, 0.0];
        world_points.insert(a, pa);
        world_points.insert(b, pb);

        let lines = BTreeMap::new();
        let constraints = vec![Constraint::new(ConstraintId::new(0), ConstraintKind::Distance { point_a: a, point_b: b, target: 1.0 })];

        let report = evaluate_constraint_residuals(&world_points, &lines, &constraints);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].severity, Some(Severity::Critical));
    }

    #[test]
    fn point_outside_every_constraint_is_isolated() {
        let mut world_points = BTreeMap::new();
        world_points.insert(PointId::new(0), WorldPoint::new(PointId::new(0), "lonely"));
        world_points.insert(PointId::new(1), WorldPoint::new(PointId::new(1), "a"));
        world_points.insert(PointId::new(2), WorldPoint::new(PointId::new(2), "b"));

        let constraints = vec![Constraint::new(
            ConstraintId::new(0),
            ConstraintKind::Distance { point_a: PointId::new(1), point_b: PointId::new(2), target: 1.0 },
        )];

        let isolated = isolated_points(&world_points, &constraints);
        assert_eq!(isolated, vec![PointId::new(0)]);
    }
}
