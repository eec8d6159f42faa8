//! Frame value types
//!
//! All recorded frames carry a `time_point_us` timestamp in microseconds
//! since an arbitrary recording epoch. Timestamps are monotonically
//! non-decreasing within one stream, but the five streams are independent
//! of each other; [`RecordBuilder`](crate::RecordBuilder) re-bases them
//! when interleaving.
//!
//! Frames are immutable value types. Compressed payloads (`color_bytes`,
//! `depth_bytes`, audio `bytes`) are opaque to this layer; the codecs that
//! produce and consume them live in the recording engine.

use serde::{Deserialize, Serialize};

use crate::calibration::CameraCalibration;
use crate::geometry::{Quaternion, Vector3};

/// One compressed color + depth frame pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    pub time_point_us: u64,
    /// Whether the color payload is a keyframe (decodable without history)
    pub keyframe: bool,
    /// Compressed color payload (VP8)
    pub color_bytes: Vec<u8>,
    /// Compressed depth payload (RVL or TDC1)
    pub depth_bytes: Vec<u8>,
}

impl VideoFrame {
    pub fn new(time_point_us: u64, keyframe: bool, color_bytes: Vec<u8>, depth_bytes: Vec<u8>) -> Self {
        Self {
            time_point_us,
            keyframe,
            color_bytes,
            depth_bytes,
        }
    }
}

/// One compressed audio frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFrame {
    pub time_point_us: u64,
    /// Compressed audio payload
    pub bytes: Vec<u8>,
}

impl AudioFrame {
    pub fn new(time_point_us: u64, bytes: Vec<u8>) -> Self {
        Self {
            time_point_us,
            bytes,
        }
    }
}

/// One inertial measurement sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImuFrame {
    pub time_point_us: u64,
    pub acceleration: Vector3,
    pub rotation_rate: Vector3,
    pub magnetic_field: Vector3,
    pub gravity: Vector3,
}

impl ImuFrame {
    pub fn new(
        time_point_us: u64,
        acceleration: Vector3,
        rotation_rate: Vector3,
        magnetic_field: Vector3,
        gravity: Vector3,
    ) -> Self {
        Self {
            time_point_us,
            acceleration,
            rotation_rate,
            magnetic_field,
            gravity,
        }
    }
}

/// One camera pose sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub time_point_us: u64,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl PoseFrame {
    pub fn new(time_point_us: u64, translation: Vector3, rotation: Quaternion) -> Self {
        Self {
            time_point_us,
            translation,
            rotation,
        }
    }
}

/// A mid-recording recalibration event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationChangeFrame {
    pub time_point_us: u64,
    pub calibration: CameraCalibration,
}

impl CalibrationChangeFrame {
    pub fn new(time_point_us: u64, calibration: CameraCalibration) -> Self {
        Self {
            time_point_us,
            calibration,
        }
    }
}

/// A decoded color frame in planar YUV 4:2:0 layout
///
/// The u and v planes are half the width and height of the y plane.
#[derive(Debug, Clone, PartialEq)]
pub struct YuvFrame {
    pub width: usize,
    pub height: usize,
    pub y_channel: Vec<u8>,
    pub u_channel: Vec<u8>,
    pub v_channel: Vec<u8>,
}

impl YuvFrame {
    pub fn new(
        width: usize,
        height: usize,
        y_channel: Vec<u8>,
        u_channel: Vec<u8>,
        v_channel: Vec<u8>,
    ) -> Self {
        debug_assert_eq!(y_channel.len(), width * height);
        debug_assert_eq!(u_channel.len(), width * height / 4);
        debug_assert_eq!(v_channel.len(), width * height / 4);
        Self {
            width,
            height,
            y_channel,
            u_channel,
            v_channel,
        }
    }
}

/// A decoded single-channel integer frame, used for depth values
#[derive(Debug, Clone, PartialEq)]
pub struct Int32Frame {
    pub width: usize,
    pub height: usize,
    pub values: Vec<i32>,
}

impl Int32Frame {
    pub fn new(width: usize, height: usize, values: Vec<i32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self {
            width,
            height,
            values,
        }
    }
}
