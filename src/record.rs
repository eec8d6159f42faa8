//! Container-level metadata and the parsed record aggregates
//!
//! A record is one serialized multi-stream recording: segment info, track
//! descriptors, attachments, and up to five time-ordered frame streams.
//! [`RecordParser`](crate::RecordParser) produces either a frame-free
//! [`RecordMetadata`] or a fully materialized [`Record`]; the two shapes are
//! distinct types so "did I ask for frames" is checked at compile time.

use serde::{Deserialize, Serialize};

use crate::calibration::CameraCalibration;
use crate::direction::DirectionTable;
use crate::frame::{AudioFrame, CalibrationChangeFrame, ImuFrame, PoseFrame, VideoFrame};

/// The number of samples per second expected from the microphone, and the
/// only rate the audio codec supports.
pub const AUDIO_SAMPLE_RATE: i32 = 48_000;

/// Depth unit in meters per depth value increment (1 mm)
pub const DEFAULT_DEPTH_UNIT: f32 = 0.001;

/// Nominal video frame rate of a recording
pub const VIDEO_FRAME_RATE: i32 = 30;

/// Color video codec identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorCodecType {
    Vp8 = 0,
}

/// Depth video codec identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthCodecType {
    Rvl = 0,
    Tdc1 = 1,
}

/// Segment-level information of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// Nanoseconds per timecode unit
    pub timecode_scale_ns: u64,
    /// Total duration in microseconds
    pub duration_us: f64,
    /// Name and version of the application that wrote the record
    pub writing_app: String,
}

/// Descriptor of the color video track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorVideoTrack {
    pub track_number: u32,
    pub width: i32,
    pub height: i32,
    pub codec: ColorCodecType,
}

/// Descriptor of the depth video track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthVideoTrack {
    pub track_number: u32,
    pub width: i32,
    pub height: i32,
    pub codec: DepthCodecType,
    /// Meters per depth value increment
    pub depth_unit: f32,
}

/// Descriptor of the audio track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub track_number: u32,
    pub sampling_frequency: f64,
}

/// Per-stream track descriptors of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTracks {
    pub color: ColorVideoTrack,
    pub depth: DepthVideoTrack,
    pub audio: AudioTrack,
}

/// Attachments of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordAttachments {
    /// Calibration of the camera at the start of the recording
    pub calibration: CameraCalibration,
    /// Cover image; absent in files written by early recorders
    pub cover_png: Option<Vec<u8>>,
}

/// A record's metadata: info, tracks, and attachments, with no frames
///
/// Produced by [`RecordParser::parse_metadata`](crate::RecordParser::parse_metadata)
/// for cheap inspection of duration, resolution, and codecs.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMetadata {
    pub info: RecordInfo,
    pub tracks: RecordTracks,
    pub attachments: RecordAttachments,
}

/// A fully materialized record, frames included
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub metadata: RecordMetadata,
    pub video_frames: Vec<VideoFrame>,
    pub audio_frames: Vec<AudioFrame>,
    pub imu_frames: Vec<ImuFrame>,
    pub pose_frames: Vec<PoseFrame>,
    pub calibration_frames: Vec<CalibrationChangeFrame>,
    /// Unprojection table for the attachment calibration, when requested
    pub direction_table: Option<DirectionTable>,
}
