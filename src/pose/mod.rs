//! Closed-form pose solvers (spec §4.4, component C4): the per-viewpoint
//! math that turns vanishing points, anchored points, and cross-view
//! correspondences into candidate camera poses, before any of the
//! strategies in `crate::strategy` pick and commit to one.

pub mod essential;
pub mod focal;
pub mod pnp;
pub mod position;
pub mod rotation;
pub mod signs;

pub use essential::{decompose_essential, estimate_essential_matrix, select_by_cheirality, Correspondence};
pub use focal::{focal_from_orthogonal_vps, is_plausible_focal};
pub use pnp::{solve_pnp_iterative, PnpObservation, PnpResult};
pub use position::{position_from_anchors, position_from_single_anchor, PositionObservation};
pub use rotation::rotation_from_vps;
pub use signs::{mean_reprojection_error, resolve_sign_ambiguity, ScoredPoint};
