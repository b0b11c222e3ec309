pub mod eigen;
pub mod gauss;
pub mod mat3;
pub mod mat4;
pub mod quaternion;

pub use mat3::{Mat3, Vec3};
pub use mat4::Mat4;
pub use quaternion::Quaternion;
