//! Camera rays and ray-ray triangulation (spec §4.2).

use crate::linalg::mat3::{add3, cross3, dot3, normalize3, scale3, sub3, Vec3};
use crate::linalg::Quaternion;
use crate::types::camera::{Extrinsics, Intrinsics};

/// A ray in world space: origin plus a unit direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Build the world-space ray through a pixel observation. The camera-space
/// ray is `((u-cx)/f, (cy-v)/f, 1)` (V is inverted relative to camera Y, per
/// spec §6 numerical conventions), normalized, then rotated into world
/// space by the *inverse* of the camera rotation — the spec explicitly
/// calls out that omitting this inverse is a known bug in one triangulation
/// variant of the source system, and this crate always applies it.
#[must_use]
pub fn camera_ray(u: f64, v: f64, intrinsics: &Intrinsics, extrinsics: &Extrinsics) -> Ray {
    let (cx, cy) = intrinsics.principal_point;
    let f = intrinsics.focal_length;
    let camera_space = [(u - cx) / f, (cy - v) / f, 1.0];
    let camera_space = normalize3(&camera_space);
    let world_direction = extrinsics.rotation.inverse().rotate_vector(camera_space);
    Ray {
        origin: extrinsics.position,
        direction: normalize3(&world_direction),
    }
}

/// Midpoint of the two closest points on two rays, solved via the standard
/// 2x2 system for the ray parameters (spec §4.2). `fallback_depth` is used
/// whenever a depth can't be trusted: near-parallel rays, a negative
/// solved depth, or a depth well beyond the cameras' baseline.
#[must_use]
pub fn triangulate(ray1: &Ray, ray2: &Ray, fallback_depth: f64) -> Vec3 {
    let d1 = ray1.direction;
    let d2 = ray2.direction;
    let w = sub3(&ray1.origin, &ray2.origin);

    let a = dot3(&d1, &d1);
    let b = dot3(&d1, &d2);
    let c = dot3(&d2, &d2);
    let d = dot3(&d1, &w);
    let e = dot3(&d2, &w);

    let denom = a * c - b * b;
    let baseline = (dot3(&w, &w)).sqrt();
    let max_depth = (100.0 * baseline).max(10.0 * fallback_depth);

    let (mut t1, mut t2) = if denom.abs() < 1e-10 {
        (fallback_depth, fallback_depth)
    } else {
        ((b * e - c * d) / denom, (a * e - b * d) / denom)
    };

    if t1 < 0.0 {
        t1 = fallback_depth;
    }
    if t2 < 0.0 {
        t2 = fallback_depth;
    }
    if t1 > max_depth {
        t1 = max_depth;
    }
    if t2 > max_depth {
        t2 = max_depth;
    }

    let p1 = add3(&ray1.origin, &scale3(&d1, t1));
    let p2 = add3(&ray2.origin, &scale3(&d2, t2));
    scale3(&add3(&p1, &p2), 0.5)
}

/// Positive when `point` lies in front of the camera (the third row of the
/// rotation matrix, dotted with `point - camera_position`, is positive).
#[must_use]
pub fn is_in_front(point: &Vec3, extrinsics: &Extrinsics) -> bool {
    depth_of(point, extrinsics) > 0.0
}

/// Signed depth of `point` along the camera's forward (+Z) axis.
#[must_use]
pub fn depth_of(point: &Vec3, extrinsics: &Extrinsics) -> f64 {
    let r = extrinsics.rotation.to_rotation_matrix();
    let forward_row = r[2];
    dot3(&forward_row, &sub3(point, &extrinsics.position))
}

#[must_use]
pub fn distance3(a: &Vec3, b: &Vec3) -> f64 {
    let d = sub3(a, b);
    dot3(&d, &d).sqrt()
}

#[must_use]
pub fn cross_product_norm(a: &Vec3, b: &Vec3) -> f64 {
    let c = cross3(a, b);
    dot3(&c, &c).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::camera::Intrinsics;

    fn cam(position: [f64; 3], rotation: Quaternion) -> Extrinsics {
        Extrinsics { rotation, position }
    }

    #[test]
    fn triangulation_round_trips_a_point_seen_by_two_cameras() {
        let intr = Intrinsics::new(1000.0, (500.0, 500.0));
        let cam1 = cam([0.0, 0.0, 0.0], Quaternion::identity());
        let cam2 = cam([2.0, 0.0, 0.0], Quaternion::identity());

        let world_point: Vec3 = [1.0, 0.3, 5.0];

        // project into both cameras (pinhole, no distortion)
        let project = |p: &Vec3, e: &Extrinsics| -> (f64, f64) {
            let cam_space = e.rotation.inverse().rotate_vector(sub3(p, &e.position));
            let u = intr.focal_length * cam_space[0] / cam_space[2] + intr.principal_point.0;
            let v = intr.principal_point.1 - intr.focal_length * cam_space[1] / cam_space[2];
            (u, v)
        };

        let (u1, v1) = project(&world_point, &cam1);
        let (u2, v2) = project(&world_point, &cam2);

        let ray1 = camera_ray(u1, v1, &intr, &cam1);
        let ray2 = camera_ray(u2, v2, &intr, &cam2);

        let recovered = triangulate(&ray1, &ray2, 10.0);
        assert!(distance3(&recovered, &world_point) < 1e-6);
    }

    #[test]
    fn near_parallel_rays_fall_back_to_fallback_depth() {
        let ray1 = Ray { origin: [0.0, 0.0, 0.0], direction: [0.0, 0.0, 1.0] };
        let ray2 = Ray { origin: [1.0, 0.0, 0.0], direction: [0.0, 0.0, 1.0] };
        let p = triangulate(&ray1, &ray2, 7.0);
        // both rays hit at parameter 7.0 along z
        assert!((p[2] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn point_in_front_is_true_for_positive_depth() {
        let e = cam([0.0, 0.0, 0.0], Quaternion::identity());
        assert!(is_in_front(&[0.0, 0.0, 5.0], &e));
        assert!(!is_in_front(&[0.0, 0.0, -5.0], &e));
    }
}
