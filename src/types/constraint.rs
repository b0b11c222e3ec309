use serde::{Deserialize, Serialize};

use super::ids::{ConstraintId, LineId, PointId};

/// Which axes a `FixedPoint` constraint pins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMask {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl AxisMask {
    #[must_use]
    pub fn as_array(self) -> [Option<f64>; 3] {
        [self.x, self.y, self.z]
    }
}

/// One geometric constraint variant, tagged by kind (spec §3 "Constraint").
/// Represented as a single sum type — residual dispatch is a `match` over
/// this tag, no virtual dispatch (spec §9 redesign flag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstraintKind {
    FixedPoint { point: PointId, target: AxisMask },
    Distance { point_a: PointId, point_b: PointId, target: f64 },
    Angle { point_a: PointId, vertex: PointId, point_c: PointId, target_degrees: f64 },
    ParallelLines { line_a: LineId, line_b: LineId },
    PerpendicularLines { line_a: LineId, line_b: LineId },
    CollinearPoints { points: Vec<PointId> },
    CoplanarPoints { points: Vec<PointId> },
    EqualDistances { pairs: Vec<(PointId, PointId)> },
    EqualAngles { triplets: Vec<(PointId, PointId, PointId)> },
}

impl ConstraintKind {
    /// Structural arity check (n >= 3 for collinear, n >= 4 for coplanar,
    /// etc), performed at scene-validation time rather than deep inside the
    /// residual engine.
    #[must_use]
    pub fn is_structurally_valid(&self) -> bool {
        match self {
            ConstraintKind::CollinearPoints { points } => points.len() >= 3,
            ConstraintKind::CoplanarPoints { points } => points.len() >= 4,
            ConstraintKind::EqualDistances { pairs } => pairs.len() >= 2,
            ConstraintKind::EqualAngles { triplets } => triplets.len() >= 2,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub id: ConstraintId,
    pub kind: ConstraintKind,
    pub enabled: bool,
}

impl Constraint {
    #[must_use]
    pub fn new(id: ConstraintId, kind: ConstraintKind) -> Self {
        Self { id, kind, enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_needs_at_least_three_points() {
        let k = ConstraintKind::CollinearPoints { points: vec![PointId::new(0), PointId::new(1)] };
        assert!(!k.is_structurally_valid());
        let k = ConstraintKind::CollinearPoints {
            points: vec![PointId::new(0), PointId::new(1), PointId::new(2)],
        };
        assert!(k.is_structurally_valid());
    }

    #[test]
    fn coplanar_needs_at_least_four_points() {
        let k = ConstraintKind::CoplanarPoints {
            points: vec![PointId::new(0), PointId::new(1), PointId::new(2)],
        };
        assert!(!k.is_structurally_valid());
    }
}
