use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::camera::Viewpoint;
use super::constraint::Constraint;
use super::ids::{CameraId, PointId};
use super::line::Line;
use super::point::WorldPoint;

/// Optional hints about how the reconstructed frame relates to the user's
/// world (spec §3 "coordinate_system?").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinateSystemHint {
    pub origin_point_id: Option<PointId>,
    pub scale: Option<f64>,
    pub ground_plane_points: Vec<PointId>,
}

/// An immutable snapshot of the scene to reconstruct. Built by the external
/// editor; the core borrows it by reference for read-only inspection and
/// writes results back via `SolveOutcome` (it never mutates this value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub world_points: BTreeMap<PointId, WorldPoint>,
    pub lines: BTreeMap<super::ids::LineId, Line>,
    pub cameras: BTreeMap<CameraId, Viewpoint>,
    pub constraints: Vec<Constraint>,
    pub coordinate_system: Option<CoordinateSystemHint>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            world_points: BTreeMap::new(),
            lines: BTreeMap::new(),
            cameras: BTreeMap::new(),
            constraints: Vec::new(),
            coordinate_system: None,
        }
    }

    #[must_use]
    pub fn enabled_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.enabled)
    }

    /// Structural validation run before any solving begins: every id
    /// referenced by a line, constraint, or image-point observation must
    /// resolve within this scene, and every constraint must have valid
    /// arity. Returns the first problem found, if any.
    pub fn validate(&self) -> Result<(), String> {
        for line in self.lines.values() {
            if !self.world_points.contains_key(&line.point_a) || !self.world_points.contains_key(&line.point_b) {
                return Err(format!("line {} references an unknown point", line.id));
            }
        }
        for camera in self.cameras.values() {
            for ip in &camera.image_points {
                if !self.world_points.contains_key(&ip.world_point) {
                    return Err(format!(
                        "camera {} image-point {} references an unknown point",
                        camera.id, ip.id
                    ));
                }
            }
        }
        for constraint in &self.constraints {
            if !constraint.kind.is_structurally_valid() {
                return Err(format!("constraint {} has invalid arity", constraint.id));
            }
        }
        Ok(())
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Every recognized solver option, enumerated explicitly (spec §9 redesign
/// flag: no untyped configuration bag).
#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub max_iterations: u32,
    pub tolerance: f64,
    pub damping_initial: f64,
    pub damping_min: f64,
    pub damping_max: f64,
    pub optimize_intrinsics: bool,
    pub robust_kernel: bool,
    pub verbose: bool,
    /// Checked between solver iterations and between initialization
    /// strategies; cooperative cancellation, not preemptive.
    pub abort_flag: Arc<AtomicBool>,
}

impl SolverOptions {
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.abort_flag.load(Ordering::Relaxed)
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
            damping_initial: 1e-3,
            damping_min: 1e-8,
            damping_max: 1e8,
            optimize_intrinsics: false,
            robust_kernel: false,
            verbose: false,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// The wire-format view of `SolverOptions` used at the serialization
/// boundary. Unknown fields are rejected rather than silently ignored
/// (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverOptionsDto {
    pub max_iterations: u32,
    pub tolerance: f64,
    pub damping_initial: f64,
    pub damping_min: f64,
    pub damping_max: f64,
    pub optimize_intrinsics: bool,
    pub robust_kernel: bool,
    pub verbose: bool,
}

impl From<&SolverOptions> for SolverOptionsDto {
    fn from(o: &SolverOptions) -> Self {
        Self {
            max_iterations: o.max_iterations,
            tolerance: o.tolerance,
            damping_initial: o.damping_initial,
            damping_min: o.damping_min,
            damping_max: o.damping_max,
            optimize_intrinsics: o.optimize_intrinsics,
            robust_kernel: o.robust_kernel,
            verbose: o.verbose,
        }
    }
}

impl From<SolverOptionsDto> for SolverOptions {
    fn from(dto: SolverOptionsDto) -> Self {
        Self {
            max_iterations: dto.max_iterations,
            tolerance: dto.tolerance,
            damping_initial: dto.damping_initial,
            damping_min: dto.damping_min,
            damping_max: dto.damping_max,
            optimize_intrinsics: dto.optimize_intrinsics,
            robust_kernel: dto.robust_kernel,
            verbose: dto.verbose,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::LineId;
    use crate::types::line::LineDirection;

    #[test]
    fn validate_rejects_dangling_line_reference() {
        let mut scene = Scene::new();
        scene.world_points.insert(PointId::new(0), WorldPoint::new(PointId::new(0), "A"));
        scene.lines.insert(
            LineId::new(0),
            Line::new(LineId::new(0), PointId::new(0), PointId::new(99), LineDirection::Free),
        );
        assert!(scene.validate().is_err());
    }

    #[test]
    fn validate_passes_on_consistent_scene() {
        let mut scene = Scene::new();
        scene.world_points.insert(PointId::new(0), WorldPoint::new(PointId::new(0), "A"));
        scene.world_points.insert(PointId::new(1), WorldPoint::new(PointId::new(1), "B"));
        scene.lines.insert(
            LineId::new(0),
            Line::new(LineId::new(0), PointId::new(0), PointId::new(1), LineDirection::Free),
        );
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn unknown_fields_rejected_in_dto() {
        let json = r#"{"max_iterations":1,"tolerance":1.0,"damping_initial":1.0,
            "damping_min":1.0,"damping_max":1.0,"optimize_intrinsics":false,
            "robust_kernel":false,"verbose":false,"bogus":1}"#;
        let parsed: Result<SolverOptionsDto, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
