//! Typed identifiers plus flat-array indexing (spec §9 redesign flag:
//! "represent as typed identifiers (integers) plus flat arrays indexed by
//! id; avoid cyclic ownership"). Each id is a thin `u32` newtype so a
//! `PointId` can never be passed where a `CameraId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            #[must_use]
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[must_use]
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

typed_id!(PointId, "Identifies a WorldPoint within a Scene.");
typed_id!(LineId, "Identifies a Line within a Scene.");
typed_id!(CameraId, "Identifies a Viewpoint (camera) within a Scene.");
typed_id!(ImagePointId, "Identifies an ImagePoint within its owning Viewpoint.");
typed_id!(ConstraintId, "Identifies a Constraint within a Scene.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_with_equal_repr() {
        let p = PointId::new(3);
        let l = LineId::new(3);
        assert_eq!(p.raw(), l.raw());
        assert_eq!(p.to_string(), "3");
    }
}
