//! Strategy evaluators (spec §4.5, component C5): each one probes a single
//! initialization path for a camera (or a camera pair) and reports
//! success/reliability, mutating only the camera(s) it targets. The
//! orchestrator (`crate::orchestrator`) decides which to run, in what
//! order, and whether to keep or roll back the result.

pub mod essential_init;
pub mod first_tier;
pub mod pnp_init;
pub mod single_camera;
pub mod snapshot;
pub mod stepped_vp;
pub mod vp_init;

pub use essential_init::try_essential_init;
pub use pnp_init::try_pnp_init;
pub use snapshot::CameraState;
pub use vp_init::{try_vp_init, try_vp_init_relaxed};

/// The common result shape every evaluator returns, named in spec §4.5 as
/// `{success, reliable, snapshot}` (the snapshot itself is handled by the
/// caller via `CameraState`, not carried in this struct).
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub strategy: &'static str,
    pub success: bool,
    pub reliable: bool,
    pub mean_reprojection_error: Option<f64>,
    pub reason: Option<String>,
}

impl EvalOutcome {
    #[must_use]
    pub fn failed(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self { strategy, success: false, reliable: false, mean_reprojection_error: None, reason: Some(reason.into()) }
    }

    #[must_use]
    pub fn succeeded(strategy: &'static str, reliable: bool, mean_reprojection_error: f64) -> Self {
        Self { strategy, success: true, reliable, mean_reprojection_error: Some(mean_reprojection_error), reason: None }
    }
}

/// Reprojection error, in pixels, considered trustworthy enough to mark a
/// strategy's result `reliable` (distinct from the looser 50px rejection
/// bound inside `pose::signs`, spec §4.4/§4.5).
pub const RELIABLE_REPROJECTION_ERROR_PX: f64 = 10.0;

/// Count of distinct world-points visibly observed by both cameras — the
/// "shares >= N constrained points" test used throughout the orchestrator
/// tiers (spec §4.6).
#[must_use]
pub fn shared_point_count(a: &crate::types::Viewpoint, b: &crate::types::Viewpoint) -> usize {
    let a_points: std::collections::BTreeSet<_> = a.image_points.iter().filter(|ip| ip.visible).map(|ip| ip.world_point).collect();
    b.image_points.iter().filter(|ip| ip.visible).filter(|ip| a_points.contains(&ip.world_point)).count()
}
