//! `try-essential-init` (spec §4.4/§4.5): essential-matrix initialization
//! between a camera pair. Places `cam_a` at the identity pose and `cam_b`
//! relative to it; translation scale is arbitrary until frame alignment
//! (`crate::alignment`) fixes it against a user scale reference.

use crate::linalg::mat3::normalize3;
use crate::pose::{decompose_essential, estimate_essential_matrix, select_by_cheirality, Correspondence};
use crate::types::camera::Extrinsics;
use crate::types::Viewpoint;

use super::EvalOutcome;

const MIN_CORRESPONDENCES: usize = 7;

fn camera_ray_direction(u: f64, v: f64, principal_point: (f64, f64), focal_length: f64) -> [f64; 3] {
    let (cx, cy) = principal_point;
    normalize3(&[(u - cx) / focal_length, (cy - v) / focal_length, 1.0])
}

/// Shared world points observed (visibly) in both cameras, paired as
/// normalized camera rays.
fn shared_correspondences(cam_a: &Viewpoint, cam_b: &Viewpoint) -> Vec<Correspondence> {
    let mut out = Vec::new();
    for ip_a in cam_a.image_points.iter().filter(|ip| ip.visible) {
        let Some(ip_b) = cam_b.image_points.iter().find(|ip| ip.visible && ip.world_point == ip_a.world_point) else {
            continue;
        };
        let ray1 = camera_ray_direction(ip_a.u, ip_a.v, cam_a.intrinsics.principal_point, cam_a.intrinsics.focal_length);
        let ray2 = camera_ray_direction(ip_b.u, ip_b.v, cam_b.intrinsics.principal_point, cam_b.intrinsics.focal_length);
        out.push(Correspondence { ray1, ray2 });
    }
    out
}

/// Attempt essential-matrix initialization for the pair `(cam_a, cam_b)`.
/// `cam_a` is reset to the identity pose; `cam_b`'s pose becomes whatever
/// the decomposition recovers relative to it.
#[must_use]
pub fn try_essential_init(cam_a: &mut Viewpoint, cam_b: &mut Viewpoint) -> EvalOutcome {
    const NAME: &str = "essential-matrix-init";

    let correspondences = shared_correspondences(cam_a, cam_b);
    if correspondences.len() < MIN_CORRESPONDENCES {
        return EvalOutcome::failed(NAME, format!("fewer than {MIN_CORRESPONDENCES} shared correspondences"));
    }

    let Some(e) = estimate_essential_matrix(&correspondences) else {
        return EvalOutcome::failed(NAME, "essential-matrix estimation failed (singular nullspace solve)");
    };
    let Some(candidates) = decompose_essential(&e) else {
        return EvalOutcome::failed(NAME, "essential-matrix decomposition failed");
    };
    let Some(relative_pose) = select_by_cheirality(&candidates, correspondences[0]) else {
        return EvalOutcome::failed(NAME, "no decomposition candidate passed cheirality");
    };

    cam_a.extrinsics = Extrinsics::identity();
    cam_b.extrinsics = relative_pose;

    let in_front_count = correspondences
        .iter()
        .filter(|c| {
            let ray1 = crate::geometry::ray::Ray { origin: cam_a.extrinsics.position, direction: normalize3(&c.ray1) };
            let world_dir2 = relative_pose.rotation.inverse().rotate_vector(normalize3(&c.ray2));
            let ray2 = crate::geometry::ray::Ray { origin: cam_b.extrinsics.position, direction: normalize3(&world_dir2) };
            let point = crate::geometry::ray::triangulate(&ray1, &ray2, 10.0);
            crate::geometry::ray::is_in_front(&point, &cam_a.extrinsics) && crate::geometry::ray::is_in_front(&point, &cam_b.extrinsics)
        })
        .count();

    let reliable = in_front_count * 10 >= correspondences.len() * 7;
    let fraction_in_front = in_front_count as f64 / correspondences.len() as f64;
    EvalOutcome::succeeded(NAME, reliable, 1.0 - fraction_in_front)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::mat3::{mul3_vec, Mat3, Vec3};
    use crate::types::{CameraId, ImagePoint, ImagePointId, PointId};

    #[test]
    fn recovers_relative_pose_from_shared_points() {
        let angle = 10f64.to_radians();
        let r: Mat3 = [[angle.cos(), 0.0, angle.sin()], [0.0, 1.0, 0.0], [-angle.sin(), 0.0, angle.cos()]];
        let t: Vec3 = [1.5, 0.0, 0.0];

        let intrinsics = crate::types::camera::Intrinsics::new(1000.0, (500.0, 500.0));
        let mut cam_a = Viewpoint::new(CameraId::new(0), "a", 1000, 1000);
        cam_a.intrinsics = intrinsics;
        let mut cam_b = Viewpoint::new(CameraId::new(1), "b", 1000, 1000);
        cam_b.intrinsics = intrinsics;

        let points: [Vec3; 10] = [
            [0.2, 0.1, 5.0], [-0.3, 0.2, 6.0], [0.5, -0.4, 4.0], [-0.1, -0.2, 7.0], [0.4, 0.3, 5.5],
            [-0.5, 0.1, 6.5], [0.0, 0.0, 8.0], [0.3, -0.3, 4.5], [-0.2, 0.4, 5.2], [0.1, -0.1, 6.2],
        ];

        for (i, p) in points.iter().enumerate() {
            let id = PointId::new(i as u32);
            let (u1, v1) = (intrinsics.focal_length * p[0] / p[2] + 500.0, 500.0 - intrinsics.focal_length * p[1] / p[2]);
            cam_a.image_points.push(ImagePoint::new(ImagePointId::new(i as u32), id, u1, v1));

            let rp = mul3_vec(&r, p);
            let p2 = [rp[0] + t[0], rp[1] + t[1], rp[2] + t[2]];
            let (u2, v2) = (intrinsics.focal_length * p2[0] / p2[2] + 500.0, 500.0 - intrinsics.focal_length * p2[1] / p2[2]);
            cam_b.image_points.push(ImagePoint::new(ImagePointId::new(100 + i as u32), id, u2, v2));
        }

        let outcome = try_essential_init(&mut cam_a, &mut cam_b);
        assert!(outcome.success, "{:?}", outcome.reason);
    }
}
