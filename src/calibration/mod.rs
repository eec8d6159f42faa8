//! Camera calibration variant model
//!
//! A calibration is a discriminated union over three device families, each
//! with its own intrinsic parameter set. The discriminant is stable across
//! the engine boundary and on disk: a calibration read back from native data
//! always re-derives the concrete variant from the discriminant, never a
//! default.
//!
//! Every variant can unproject a normalized image coordinate (uv in
//! [0, 1] x [0, 1]) into a 3D direction and project a direction back to uv.
//! The per-device optics live in the `kinect` and `ios` submodules.

mod ios;
mod kinect;

use serde::{Deserialize, Serialize};

use crate::engine::EngineRef;
use crate::error::Error;
use crate::geometry::{Vector2, Vector3};
use crate::handle::Handle;

/// Camera device family discriminant
///
/// The numeric values are part of the container format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraDeviceType {
    AzureKinect = 0,
    Ios = 1,
    Undistorted = 2,
}

impl CameraDeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraDeviceType::AzureKinect => "AzureKinect",
            CameraDeviceType::Ios => "IOS",
            CameraDeviceType::Undistorted => "Undistorted",
        }
    }
}

impl std::fmt::Display for CameraDeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i32> for CameraDeviceType {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Error> {
        match value {
            0 => Ok(CameraDeviceType::AzureKinect),
            1 => Ok(CameraDeviceType::Ios),
            2 => Ok(CameraDeviceType::Undistorted),
            other => Err(Error::UnsupportedDeviceType(other)),
        }
    }
}

/// Azure Kinect intrinsics: Brown-Conrady distortion over a pinhole model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinectCalibration {
    pub color_width: i32,
    pub color_height: i32,
    pub depth_width: i32,
    pub depth_height: i32,
    /// Resolution the intrinsics below are expressed in
    pub resolution_width: i32,
    pub resolution_height: i32,
    pub cx: f32,
    pub cy: f32,
    pub fx: f32,
    pub fy: f32,
    pub k1: f32,
    pub k2: f32,
    pub k3: f32,
    pub k4: f32,
    pub k5: f32,
    pub k6: f32,
    /// Center of distortion; zero for the Brown-Conrady model
    pub codx: f32,
    pub cody: f32,
    pub p1: f32,
    pub p2: f32,
    pub max_radius_for_projection: f32,
}

/// iOS (ARKit) intrinsics with radial lens-distortion lookup tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IosCalibration {
    pub color_width: i32,
    pub color_height: i32,
    pub depth_width: i32,
    pub depth_height: i32,
    pub fx: f32,
    pub fy: f32,
    pub ox: f32,
    pub oy: f32,
    /// Dimension the intrinsics and distortion center are expressed in
    pub reference_dimension_width: f32,
    pub reference_dimension_height: f32,
    pub lens_distortion_center_x: f32,
    pub lens_distortion_center_y: f32,
    /// Relative radial magnification for linearly spaced radii, radius 0 first
    pub lens_distortion_lookup_table: Vec<f32>,
    pub inverse_lens_distortion_lookup_table: Vec<f32>,
}

/// Plain pinhole intrinsics with no distortion, uv-normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndistortedCalibration {
    pub color_width: i32,
    pub color_height: i32,
    pub depth_width: i32,
    pub depth_height: i32,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

/// Camera calibration, discriminated by device family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CameraCalibration {
    AzureKinect(KinectCalibration),
    Ios(IosCalibration),
    Undistorted(UndistortedCalibration),
}

impl CameraCalibration {
    /// The device-family discriminant of this calibration
    pub fn device_type(&self) -> CameraDeviceType {
        match self {
            CameraCalibration::AzureKinect(_) => CameraDeviceType::AzureKinect,
            CameraCalibration::Ios(_) => CameraDeviceType::Ios,
            CameraCalibration::Undistorted(_) => CameraDeviceType::Undistorted,
        }
    }

    pub fn color_width(&self) -> i32 {
        match self {
            CameraCalibration::AzureKinect(c) => c.color_width,
            CameraCalibration::Ios(c) => c.color_width,
            CameraCalibration::Undistorted(c) => c.color_width,
        }
    }

    pub fn color_height(&self) -> i32 {
        match self {
            CameraCalibration::AzureKinect(c) => c.color_height,
            CameraCalibration::Ios(c) => c.color_height,
            CameraCalibration::Undistorted(c) => c.color_height,
        }
    }

    pub fn depth_width(&self) -> i32 {
        match self {
            CameraCalibration::AzureKinect(c) => c.depth_width,
            CameraCalibration::Ios(c) => c.depth_width,
            CameraCalibration::Undistorted(c) => c.depth_width,
        }
    }

    pub fn depth_height(&self) -> i32 {
        match self {
            CameraCalibration::AzureKinect(c) => c.depth_height,
            CameraCalibration::Ios(c) => c.depth_height,
            CameraCalibration::Undistorted(c) => c.depth_height,
        }
    }

    /// Unproject a normalized image coordinate into a 3D direction
    ///
    /// The uv range is [0, 1] x [0, 1]. Directions point towards negative z.
    pub fn direction(&self, uv: Vector2) -> Vector3 {
        match self {
            CameraCalibration::AzureKinect(c) => kinect::compute_direction(c, uv),
            CameraCalibration::Ios(c) => ios::compute_direction(c, uv),
            CameraCalibration::Undistorted(c) => {
                Vector3::new((uv.x - c.cx) / c.fx, (uv.y - c.cy) / c.fy, -1.0)
            }
        }
    }

    /// Project a 3D direction back to a normalized image coordinate
    ///
    /// Directions the device cannot see map outside [0, 1] x [0, 1].
    pub fn uv(&self, direction: Vector3) -> Vector2 {
        match self {
            CameraCalibration::AzureKinect(c) => kinect::compute_uv(c, direction),
            CameraCalibration::Ios(c) => ios::compute_uv(c, direction),
            CameraCalibration::Undistorted(c) => {
                let x = direction.x / -direction.z;
                let y = direction.y / -direction.z;
                Vector2::new(c.fx * x + c.cx, c.fy * y + c.cy)
            }
        }
    }

    /// Construct an engine-side calibration object and return an owned handle
    pub fn to_native(&self, engine: &EngineRef) -> Result<Handle, Error> {
        let json = match self {
            CameraCalibration::AzureKinect(c) => serde_json::to_vec(c)?,
            CameraCalibration::Ios(c) => serde_json::to_vec(c)?,
            CameraCalibration::Undistorted(c) => serde_json::to_vec(c)?,
        };
        let addr = engine
            .borrow_mut()
            .create_calibration(self.device_type() as i32, &json);
        if !addr.is_valid() {
            return Err(Error::Engine(format!(
                "engine rejected {} calibration",
                self.device_type()
            )));
        }
        Ok(Handle::owned(engine.clone(), addr))
    }

    /// Read an engine-side calibration object back into a value
    ///
    /// Reads the discriminant first, then decodes exactly the field set of
    /// the matching variant. An unrecognized discriminant is
    /// [`Error::UnsupportedDeviceType`].
    pub fn from_native(engine: &EngineRef, handle: &Handle) -> Result<Self, Error> {
        let engine = engine.borrow();
        let discriminant = engine.calibration_device_type(handle.addr());
        let device_type = CameraDeviceType::try_from(discriminant)?;
        let json = engine
            .calibration_json(handle.addr())
            .ok_or_else(|| Error::Engine("no calibration object at handle address".into()))?;
        Ok(match device_type {
            CameraDeviceType::AzureKinect => {
                CameraCalibration::AzureKinect(serde_json::from_slice(&json)?)
            }
            CameraDeviceType::Ios => CameraCalibration::Ios(serde_json::from_slice(&json)?),
            CameraDeviceType::Undistorted => {
                CameraCalibration::Undistorted(serde_json::from_slice(&json)?)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn undistorted_calibration() -> CameraCalibration {
        CameraCalibration::Undistorted(UndistortedCalibration {
            color_width: 640,
            color_height: 480,
            depth_width: 320,
            depth_height: 240,
            fx: 1.4,
            fy: 1.8,
            cx: 0.5,
            cy: 0.5,
        })
    }

    #[test]
    fn test_device_type_discriminants() {
        assert_eq!(CameraDeviceType::AzureKinect as i32, 0);
        assert_eq!(CameraDeviceType::Ios as i32, 1);
        assert_eq!(CameraDeviceType::Undistorted as i32, 2);
    }

    #[test]
    fn test_device_type_try_from() {
        assert_eq!(
            CameraDeviceType::try_from(1).unwrap(),
            CameraDeviceType::Ios
        );
        assert_eq!(
            CameraDeviceType::try_from(3),
            Err(Error::UnsupportedDeviceType(3))
        );
        assert_eq!(
            CameraDeviceType::try_from(-1),
            Err(Error::UnsupportedDeviceType(-1))
        );
    }

    #[test]
    fn test_undistorted_direction_points_back() {
        let calibration = undistorted_calibration();
        let center = calibration.direction(Vector2::new(0.5, 0.5));
        assert_eq!(center, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_native_roundtrip_all_variants() {
        use crate::engine::engine_ref;
        use crate::engine::memory::MemoryEngine;

        let variants = [
            CameraCalibration::AzureKinect(KinectCalibration {
                color_width: 1280,
                color_height: 720,
                depth_width: 640,
                depth_height: 576,
                resolution_width: 640,
                resolution_height: 576,
                cx: 319.5,
                cy: 287.5,
                fx: 500.0,
                fy: 500.0,
                k1: 0.1,
                k2: -0.05,
                k3: 0.0,
                k4: 0.0,
                k5: 0.0,
                k6: 0.0,
                codx: 0.0,
                cody: 0.0,
                p1: 0.001,
                p2: -0.001,
                max_radius_for_projection: 2.0,
            }),
            CameraCalibration::Ios(IosCalibration {
                color_width: 1920,
                color_height: 1440,
                depth_width: 256,
                depth_height: 192,
                fx: 1400.0,
                fy: 1400.0,
                ox: 960.0,
                oy: 720.0,
                reference_dimension_width: 1920.0,
                reference_dimension_height: 1440.0,
                lens_distortion_center_x: 958.0,
                lens_distortion_center_y: 722.0,
                lens_distortion_lookup_table: vec![0.0, 0.01, 0.03],
                inverse_lens_distortion_lookup_table: vec![0.0, -0.01, -0.03],
            }),
            undistorted_calibration(),
        ];

        let engine = engine_ref(MemoryEngine::new());
        for calibration in variants {
            let handle = calibration.to_native(&engine).unwrap();
            let back = CameraCalibration::from_native(&engine, &handle).unwrap();
            assert_eq!(back, calibration);
        }
    }

    #[test]
    fn test_undistorted_uv_roundtrip() {
        let calibration = undistorted_calibration();
        let uv = Vector2::new(0.25, 0.75);
        let direction = calibration.direction(uv);
        let back = calibration.uv(direction);
        assert!((back.x - uv.x).abs() < 1e-6);
        assert!((back.y - uv.y).abs() < 1e-6);
    }
}
