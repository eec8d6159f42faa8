//! Precomputed per-pixel unprojection directions
//!
//! Unprojecting through the calibration model per pixel is expensive for the
//! distorted device families, so a record can carry a table of directions
//! sampled over the depth grid. Depth values multiply into these directions
//! to produce 3D points without re-deriving optics per pixel.

use serde::{Deserialize, Serialize};

use crate::calibration::CameraCalibration;
use crate::geometry::{Vector2, Vector3};

/// Unprojection directions sampled over the depth grid of a calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionTable {
    width: i32,
    height: i32,
    directions: Vec<Vector3>,
}

impl DirectionTable {
    pub fn new(width: i32, height: i32, directions: Vec<Vector3>) -> Self {
        debug_assert_eq!(directions.len(), (width * height) as usize);
        Self {
            width,
            height,
            directions,
        }
    }

    /// Sample a calibration at every depth-grid pixel
    ///
    /// Pixel (col, row) samples uv = (col / (w - 1), row / (h - 1)).
    pub fn from_calibration(calibration: &CameraCalibration) -> Self {
        let width = calibration.depth_width();
        let height = calibration.depth_height();
        let mut directions = Vec::with_capacity((width * height) as usize);

        let u_scale = 1.0 / (width - 1) as f32;
        let v_scale = 1.0 / (height - 1) as f32;
        for row in 0..height {
            for col in 0..width {
                let uv = Vector2::new(col as f32 * u_scale, row as f32 * v_scale);
                directions.push(calibration.direction(uv));
            }
        }

        Self {
            width,
            height,
            directions,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn directions(&self) -> &[Vector3] {
        &self.directions
    }

    /// Bilinearly interpolated direction for a uv in [0, 1] x [0, 1]
    pub fn direction(&self, uv: Vector2) -> Vector3 {
        let col = uv.x * (self.width - 1) as f32;
        let row = uv.y * (self.height - 1) as f32;

        let left = (col.floor() as i32).clamp(0, self.width - 2);
        let top = (row.floor() as i32).clamp(0, self.height - 2);

        let idx = (left + top * self.width) as usize;
        let left_top = self.directions[idx];
        let right_top = self.directions[idx + 1];
        let left_bottom = self.directions[idx + self.width as usize];

        let col_remainder = col - left as f32;
        let row_remainder = row - top as f32;

        left_top + (right_top - left_top) * col_remainder
            + (left_bottom - left_top) * row_remainder
    }
}
