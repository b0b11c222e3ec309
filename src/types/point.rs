use serde::{Deserialize, Serialize};

use super::ids::{LineId, PointId};

/// One axis (X, Y, or Z) of a `WorldPoint`'s coordinate, independently either
/// locked to a user value or free.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AxisLock {
    Locked(f64),
    Free,
}

impl AxisLock {
    #[must_use]
    pub fn value(self) -> Option<f64> {
        match self {
            AxisLock::Locked(v) => Some(v),
            AxisLock::Free => None,
        }
    }

    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, AxisLock::Locked(_))
    }
}

/// A world-space point: an identifier, an optional per-axis lock, an
/// optional inferred coordinate (propagated from axis-aligned `Line`
/// constraints), and the solver's current estimate.
///
/// Invariant: an inferred component must never overwrite a locked one. This
/// crate upholds it by construction — `set_inferred` is a no-op on an axis
/// that is already locked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldPoint {
    pub id: PointId,
    pub name: String,
    pub locked: [AxisLock; 3],
    pub inferred: [Option<f64>; 3],
    pub connected_line_ids: Vec<LineId>,
    /// Current estimate during / after a solve. Seeded by the caller (or the
    /// orchestrator) before optimization begins.
    pub optimized_xyz: [f64; 3],
}

impl WorldPoint {
    #[must_use]
    pub fn new(id: PointId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            locked: [AxisLock::Free; 3],
            inferred: [None; 3],
            connected_line_ids: Vec::new(),
            optimized_xyz: [0.0; 3],
        }
    }

    #[must_use]
    pub fn with_locked(mut self, axis: usize, value: f64) -> Self {
        self.locked[axis] = AxisLock::Locked(value);
        self
    }

    /// Record a value inferred from a line-direction constraint. No-op if
    /// the axis is already locked (upholds the locked-beats-inferred
    /// invariant).
    pub fn set_inferred(&mut self, axis: usize, value: f64) {
        if !self.locked[axis].is_locked() {
            self.inferred[axis] = Some(value);
        }
    }

    /// Locked coordinate where present, else inferred, else `None` (free).
    #[must_use]
    pub fn effective_xyz(&self) -> [Option<f64>; 3] {
        let mut out = [None; 3];
        for axis in 0..3 {
            out[axis] = self.locked[axis].value().or(self.inferred[axis]);
        }
        out
    }

    /// True when all three components are locked or inferred.
    #[must_use]
    pub fn fully_constrained(&self) -> bool {
        self.effective_xyz().iter().all(Option::is_some)
    }

    /// True when at least one component is locked or inferred.
    #[must_use]
    pub fn anchored(&self) -> bool {
        self.effective_xyz().iter().any(Option::is_some)
    }

    /// Effective coordinate as a dense array, falling back to the current
    /// optimized estimate on free axes. Used wherever "where is this point
    /// right now" is asked during initialization.
    #[must_use]
    pub fn effective_or_optimized(&self) -> [f64; 3] {
        let eff = self.effective_xyz();
        let mut out = self.optimized_xyz;
        for axis in 0..3 {
            if let Some(v) = eff[axis] {
                out[axis] = v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_beats_inferred() {
        let mut p = WorldPoint::new(PointId::new(0), "A").with_locked(1, 5.0);
        p.set_inferred(1, 99.0);
        assert_eq!(p.effective_xyz()[1], Some(5.0));
    }

    #[test]
    fn fully_constrained_requires_all_three() {
        let mut p = WorldPoint::new(PointId::new(0), "A").with_locked(0, 1.0).with_locked(1, 2.0);
        assert!(!p.fully_constrained());
        p.set_inferred(2, 3.0);
        assert!(p.fully_constrained());
    }

    #[test]
    fn effective_or_optimized_prefers_locked() {
        let mut p = WorldPoint::new(PointId::new(0), "A").with_locked(0, 1.0);
        p.optimized_xyz = [9.0, 9.0, 9.0];
        let xyz = p.effective_or_optimized();
        assert_eq!(xyz, [1.0, 9.0, 9.0]);
    }
}
