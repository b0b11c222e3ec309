//! `try-pnp-init` (spec §4.5): PnP-based initialization for one camera from
//! its fully-constrained, visible world points.

use std::collections::BTreeMap;

use crate::pose::{solve_pnp_iterative, PnpObservation};
use crate::types::ids::PointId;
use crate::types::{Viewpoint, WorldPoint};

use super::EvalOutcome;

const MIN_POINTS: usize = 3;

/// Attempt PnP initialization of `viewpoint` from its currently
/// fully-constrained, visible world points, refining from its current pose
/// as the initial guess (identity on a fresh camera, or whatever a prior
/// strategy or a preliminary solve has already placed it at for late-PnP).
#[must_use]
pub fn try_pnp_init(world_points: &BTreeMap<PointId, WorldPoint>, viewpoint: &mut Viewpoint) -> EvalOutcome {
    const NAME: &str = "pnp-init";

    let observations: Vec<PnpObservation> = viewpoint
        .image_points
        .iter()
        .filter(|ip| ip.visible)
        .filter_map(|ip| {
            let point = world_points.get(&ip.world_point)?;
            if !point.fully_constrained() {
                return None;
            }
            Some(PnpObservation { point: point.effective_or_optimized(), pixel: (ip.u, ip.v) })
        })
        .collect();

    if observations.len() < MIN_POINTS {
        return EvalOutcome::failed(NAME, format!("fewer than {MIN_POINTS} fully-constrained observed points"));
    }

    let Some(result) = solve_pnp_iterative(&observations, &viewpoint.intrinsics, viewpoint.extrinsics) else {
        return EvalOutcome::failed(NAME, "PnP solve failed to produce a pose");
    };

    viewpoint.extrinsics = result.extrinsics;
    EvalOutcome::succeeded(NAME, result.reliable, result.mean_reprojection_error)
}
