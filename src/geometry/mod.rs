pub mod euler;
pub mod project;
pub mod ray;

pub use project::{distort, project};
pub use ray::{camera_ray, depth_of, distance3, is_in_front, triangulate, Ray};
