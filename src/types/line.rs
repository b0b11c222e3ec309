use serde::{Deserialize, Serialize};

use super::ids::{LineId, PointId};

/// Direction tag for a `Line`: both a user-facing constraint (the line
/// should appear to run along this world axis) and, per spec §3/§4.3, an
/// implicit vanishing-line axis hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineDirection {
    Free,
    Horizontal,
    Vertical,
    XAligned,
    ZAligned,
}

impl LineDirection {
    /// Maps a direction tag to the vanishing-point axis it implies.
    /// `Horizontal` is ambiguous (could be X or Z) and is ignored for VP
    /// purposes, per spec §3.
    #[must_use]
    pub fn vp_axis(self) -> Option<Axis> {
        match self {
            LineDirection::Vertical => Some(Axis::Y),
            LineDirection::XAligned => Some(Axis::X),
            LineDirection::ZAligned => Some(Axis::Z),
            LineDirection::Horizontal | LineDirection::Free => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

/// An ordered pair of world points plus an optional direction hint and
/// target length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub point_a: PointId,
    pub point_b: PointId,
    pub direction: LineDirection,
    pub target_length: Option<f64>,
}

impl Line {
    #[must_use]
    pub fn new(id: LineId, point_a: PointId, point_b: PointId, direction: LineDirection) -> Self {
        Self {
            id,
            point_a,
            point_b,
            direction,
            target_length: None,
        }
    }

    #[must_use]
    pub fn with_target_length(mut self, length: f64) -> Self {
        self.target_length = Some(length);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_is_ambiguous_for_vp() {
        assert_eq!(LineDirection::Horizontal.vp_axis(), None);
        assert_eq!(LineDirection::Vertical.vp_axis(), Some(Axis::Y));
        assert_eq!(LineDirection::XAligned.vp_axis(), Some(Axis::X));
        assert_eq!(LineDirection::ZAligned.vp_axis(), Some(Axis::Z));
    }
}
