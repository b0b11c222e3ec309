use serde::{Deserialize, Serialize};

use super::ids::{CameraId, ImagePointId, PointId};
use super::line::Axis;
use crate::linalg::quaternion::Quaternion;

/// Camera intrinsic parameters, including lens distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub focal_length: f64,
    pub principal_point: (f64, f64),
    pub skew: f64,
    pub aspect_ratio: f64,
    /// Radial distortion coefficients k1, k2, k3.
    pub radial: [f64; 3],
    /// Tangential distortion coefficients p1, p2.
    pub tangential: [f64; 2],
}

impl Intrinsics {
    #[must_use]
    pub fn new(focal_length: f64, principal_point: (f64, f64)) -> Self {
        Self {
            focal_length,
            principal_point,
            skew: 0.0,
            aspect_ratio: 1.0,
            radial: [0.0; 3],
            tangential: [0.0; 2],
        }
    }

    /// A safe default used by the essential-matrix fallback (spec §4.6
    /// Tier 3): f = max(width, height), principal point at image center,
    /// zero distortion.
    #[must_use]
    pub fn safe_default(width: u32, height: u32) -> Self {
        Self::new(width.max(height) as f64, (width as f64 / 2.0, height as f64 / 2.0))
    }
}

/// Camera extrinsic parameters: world-to-camera-free pose stored as unit
/// quaternion (w, x, y, z) plus a world-frame position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    pub rotation: Quaternion,
    pub position: [f64; 3],
}

impl Extrinsics {
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: Quaternion::identity(),
            position: [0.0; 3],
        }
    }
}

/// A single 2D observation, uniquely belonging to one viewpoint and one
/// world point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImagePoint {
    pub id: ImagePointId,
    pub world_point: PointId,
    pub u: f64,
    pub v: f64,
    pub visible: bool,
    pub confidence: f64,
}

impl ImagePoint {
    #[must_use]
    pub fn new(id: ImagePointId, world_point: PointId, u: f64, v: f64) -> Self {
        Self {
            id,
            world_point,
            u,
            v,
            visible: true,
            confidence: 1.0,
        }
    }
}

/// A user-drawn pair of image pixels tagged with a world axis, contributing
/// one line to that axis's vanishing-point fit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VanishingLine {
    pub p1: (f64, f64),
    pub p2: (f64, f64),
    pub axis: Axis,
}

/// A photograph: pixel dimensions, intrinsics, extrinsics, and its
/// observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewpoint {
    pub id: CameraId,
    pub name: String,
    pub image_width: u32,
    pub image_height: u32,
    pub intrinsics: Intrinsics,
    pub extrinsics: Extrinsics,
    pub image_points: Vec<ImagePoint>,
    pub vanishing_lines: Vec<VanishingLine>,
}

impl Viewpoint {
    #[must_use]
    pub fn new(id: CameraId, name: impl Into<String>, image_width: u32, image_height: u32) -> Self {
        let cx = image_width as f64 / 2.0;
        let cy = image_height as f64 / 2.0;
        Self {
            id,
            name: name.into(),
            image_width,
            image_height,
            intrinsics: Intrinsics::new(image_width.max(image_height) as f64, (cx, cy)),
            extrinsics: Extrinsics::identity(),
            image_points: Vec::new(),
            vanishing_lines: Vec::new(),
        }
    }

    /// The image-point observing `point`, if this viewpoint has one. Within
    /// one viewpoint each world point has at most one `ImagePoint`.
    #[must_use]
    pub fn observation_of(&self, point: PointId) -> Option<&ImagePoint> {
        self.image_points.iter().find(|ip| ip.world_point == point && ip.visible)
    }

    #[must_use]
    pub fn vanishing_lines_for_axis(&self, axis: Axis) -> Vec<&VanishingLine> {
        self.vanishing_lines.iter().filter(|l| l.axis == axis).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_default_centers_principal_point() {
        let intr = Intrinsics::safe_default(1000, 800);
        assert_eq!(intr.focal_length, 1000.0);
        assert_eq!(intr.principal_point, (500.0, 400.0));
    }

    #[test]
    fn observation_of_respects_visibility() {
        let mut vp = Viewpoint::new(CameraId::new(0), "cam0", 100, 100);
        let mut ip = ImagePoint::new(ImagePointId::new(0), PointId::new(1), 10.0, 10.0);
        ip.visible = false;
        vp.image_points.push(ip);
        assert!(vp.observation_of(PointId::new(1)).is_none());
    }
}
