//! Euler <-> quaternion conversions used by the geometry layer (roll
//! correction in the closed-form rotation solver, diagnostics reporting).
//! The reverse direction (`Quaternion::to_euler_zyx`) lives in the kernel
//! alongside the rest of the quaternion algebra (spec §4.1); this module is
//! the construction direction the geometry primitives need (spec §4.2).

use crate::linalg::Quaternion;

/// Build a unit quaternion from ZYX Euler angles (radians): roll about X,
/// pitch about Y, yaw about Z, applied in that order (intrinsic ZYX).
#[must_use]
pub fn from_euler_zyx(roll: f64, pitch: f64, yaw: f64) -> Quaternion {
    let (sr, cr) = (roll * 0.5).sin_cos();
    let (sp, cp) = (pitch * 0.5).sin_cos();
    let (sy, cy) = (yaw * 0.5).sin_cos();

    Quaternion::new(
        cr * cp * cy + sr * sp * sy,
        sr * cp * cy - cr * sp * sy,
        cr * sp * cy + sr * cp * sy,
        cr * cp * sy - sr * sp * cy,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_angles_give_identity() {
        let q = from_euler_zyx(0.0, 0.0, 0.0);
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn round_trips_through_to_euler_zyx() {
        let (roll, pitch, yaw) = (0.2, -0.3, 0.6);
        let q = from_euler_zyx(roll, pitch, yaw);
        let (r2, p2, y2) = q.to_euler_zyx();
        assert!((roll - r2).abs() < 1e-9);
        assert!((pitch - p2).abs() < 1e-9);
        assert!((yaw - y2).abs() < 1e-9);
    }
}
