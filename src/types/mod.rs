pub mod camera;
pub mod constraint;
pub mod ids;
pub mod line;
pub mod point;
pub mod scene;

pub use camera::{Extrinsics, ImagePoint, Intrinsics, VanishingLine, Viewpoint};
pub use constraint::{AxisMask, Constraint, ConstraintKind};
pub use ids::{CameraId, ConstraintId, ImagePointId, LineId, PointId};
pub use line::{Axis, Line, LineDirection};
pub use point::{AxisLock, WorldPoint};
pub use scene::{CoordinateSystemHint, Scene, SolverOptions, SolverOptionsDto};
