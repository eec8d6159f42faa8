//! Geometry value types shared across the crate
//!
//! Recording coordinates are right-handed with x: right, y: up, z: back.
//! Unprojection directions therefore point towards negative z.

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// 3D vector of `f32`
pub type Vector3 = na::Vector3<f32>;

/// 2D vector of `f32`, used for normalized image coordinates (uv in [0, 1])
pub type Vector2 = na::Vector2<f32>;

/// Quaternion of `f32` in (w, x, y, z) order
pub type Quaternion = na::Quaternion<f32>;

/// Plane corresponding to ax + by + cz = d where normal = (a, b, c) and constant = d
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vector3,
    pub constant: f32,
}

impl Plane {
    pub fn new(normal: Vector3, constant: f32) -> Self {
        Self { normal, constant }
    }

    /// Signed distance from a point to the plane, positive on the normal side
    pub fn distance(&self, point: &Vector3) -> f32 {
        self.normal.dot(point) - self.constant
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            normal: Vector3::new(0.0, 1.0, 0.0),
            constant: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_distance() {
        let floor = Plane::new(Vector3::new(0.0, 1.0, 0.0), 1.0);
        assert_eq!(floor.distance(&Vector3::new(0.0, 3.0, 0.0)), 2.0);
        assert_eq!(floor.distance(&Vector3::new(5.0, 1.0, -2.0)), 0.0);
    }

    #[test]
    fn test_plane_default_is_up() {
        let plane = Plane::default();
        assert_eq!(plane.normal, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(plane.constant, 0.0);
    }
}
