//! Quaternion algebra and quaternion <-> rotation-matrix <-> Euler
//! conversions (spec §4.1). Stored and serialized as (w, x, y, z).

use serde::{Deserialize, Serialize};

use super::mat3::Mat3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    #[must_use]
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    #[must_use]
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    #[must_use]
    pub fn norm(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n < 1e-12 {
            return Self::identity();
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    #[must_use]
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Inverse under the Hamilton product; equals the conjugate for unit
    /// quaternions, but this divides by the squared norm regardless.
    #[must_use]
    pub fn inverse(self) -> Self {
        let n2 = self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z;
        let c = self.conjugate();
        Self::new(c.w / n2, c.x / n2, c.y / n2, c.z / n2)
    }

    #[must_use]
    pub fn multiply(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Rotate a vector by this (assumed unit) quaternion: `q ∘ v ∘ q*`.
    #[must_use]
    pub fn rotate_vector(self, v: [f64; 3]) -> [f64; 3] {
        let qv = Quaternion::new(0.0, v[0], v[1], v[2]);
        let r = self.multiply(qv).multiply(self.conjugate());
        [r.x, r.y, r.z]
    }

    /// Standard trace-branch reconstruction of a unit quaternion from a
    /// rotation matrix.
    #[must_use]
    pub fn from_rotation_matrix(m: &Mat3) -> Self {
        let trace = m[0][0] + m[1][1] + m[2][2];
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new(
                0.25 * s,
                (m[2][1] - m[1][2]) / s,
                (m[0][2] - m[2][0]) / s,
                (m[1][0] - m[0][1]) / s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
            Self::new(
                (m[2][1] - m[1][2]) / s,
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
            Self::new(
                (m[0][2] - m[2][0]) / s,
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
            )
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
            Self::new(
                (m[1][0] - m[0][1]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
            )
        }
        .normalize()
    }

    #[must_use]
    pub fn to_rotation_matrix(self) -> Mat3 {
        let q = self.normalize();
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - z * w),
                2.0 * (x * z + y * w),
            ],
            [
                2.0 * (x * y + z * w),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - x * w),
            ],
            [
                2.0 * (x * z - y * w),
                2.0 * (y * z + x * w),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ]
    }

    /// Euler angles (ZYX convention, radians): returns (roll_x, pitch_y, yaw_z).
    #[must_use]
    pub fn to_euler_zyx(self) -> (f64, f64, f64) {
        let q = self.normalize();
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);

        let sinr_cosp = 2.0 * (w * x + y * z);
        let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
        let roll = sinr_cosp.atan2(cosr_cosp);

        let sinp = 2.0 * (w * y - z * x);
        let pitch = if sinp.abs() >= 1.0 {
            std::f64::consts::FRAC_PI_2.copysign(sinp)
        } else {
            sinp.asin()
        };

        let siny_cosp = 2.0 * (w * z + x * y);
        let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
        let yaw = siny_cosp.atan2(cosy_cosp);

        (roll, pitch, yaw)
    }

    #[must_use]
    pub fn from_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        let n = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if n < 1e-12 {
            return Self::identity();
        }
        let half = angle / 2.0;
        let s = half.sin() / n;
        Self::new(half.cos(), axis[0] * s, axis[1] * s, axis[2] * s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quaternion_times_its_conjugate_is_identity() {
        let q = Quaternion::from_axis_angle([0.0, 1.0, 0.0], 1.234).normalize();
        let prod = q.multiply(q.conjugate());
        assert!((prod.w - 1.0).abs() < 1e-12);
        assert!(prod.x.abs() < 1e-12);
        assert!(prod.y.abs() < 1e-12);
        assert!(prod.z.abs() < 1e-12);
    }

    #[test]
    fn matrix_round_trip() {
        let q = Quaternion::from_axis_angle([0.3, 0.7, -0.2], 0.9).normalize();
        let m = q.to_rotation_matrix();
        let q2 = Quaternion::from_rotation_matrix(&m);
        // up to sign ambiguity
        let same = (q.w - q2.w).abs() < 1e-9 && (q.x - q2.x).abs() < 1e-9;
        let opposite = (q.w + q2.w).abs() < 1e-9 && (q.x + q2.x).abs() < 1e-9;
        assert!(same || opposite);
    }

    #[test]
    fn rotate_vector_by_90deg_about_z() {
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2);
        let v = q.rotate_vector([1.0, 0.0, 0.0]);
        assert!((v[0]).abs() < 1e-9);
        assert!((v[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn identity_matrix_has_zero_euler_angles() {
        let (r, p, y) = Quaternion::identity().to_euler_zyx();
        assert!(r.abs() < 1e-12 && p.abs() < 1e-12 && y.abs() < 1e-12);
    }
}
