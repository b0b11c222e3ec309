//! # scenecal
//!
//! A camera-and-point scene reconstruction engine for photogrammetry from
//! user-supplied geometric constraints: given one or more photographs, a set
//! of world points the user has identified in them, and constraints between
//! those points (distances, angles, parallelism, collinearity, ...), this
//! crate recovers camera poses and 3D point positions consistent with the
//! constraints.
//!
//! The pipeline runs in two phases. First, closed-form initialization
//! (vanishing points, PnP, essential-matrix decomposition) gets every
//! camera and point to a plausible starting pose without any iterative
//! optimization. Second, a damped Gauss-Newton solver refines the whole
//! scene jointly against reprojection error and every user constraint.
//!
//! ## Example
//!
//! ```rust,no_run
//! use scenecal::prelude::*;
//!
//! # fn main() {
//! let scene = Scene::new();
//! let options = SolverOptions::default();
//! let outcome = scenecal::session::solve(&scene, &options);
//! # let _ = outcome;
//! # }
//! ```

pub mod alignment;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod linalg;
pub mod log;
pub mod orchestrator;
pub mod pose;
pub mod residuals;
pub mod session;
pub mod solver;
pub mod strategy;
pub mod types;
pub mod vanishing;

pub mod prelude {
    //! Convenience re-exports of the crate's external surface.
    pub use crate::error::{Error, Result};
    pub use crate::session::solve;
    pub use crate::types::{
        Axis, AxisLock, Constraint, ConstraintKind, Extrinsics, ImagePoint, Intrinsics, Line, LineDirection, PointId,
        Scene, SolverOptions, Viewpoint, WorldPoint,
    };
}
