//! Volumetric recording containers for RGB-D cameras
//!
//! This crate reads and writes records: multi-stream recordings combining
//! compressed color video, compressed depth video, audio, IMU samples, and
//! camera pose, together with the camera calibration needed to unproject
//! depth pixels into 3D.
//!
//! It is a pure library with no I/O of its own. Codec work and the physical
//! container encoding live behind the [`RecordingEngine`] trait; the crate
//! ships [`MemoryEngine`] as a self-contained reference engine, and
//! embedding applications can provide native engines over FFI.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        rgbdrec                           │
//! │                                                          │
//! │  calibration ── camera models (Kinect / iOS / pinhole)   │
//! │  frame, record ── value types of a recording             │
//! │  builder ── multiplexes frame streams into a container   │
//! │  parser ── two-phase container reading                   │
//! │  mapper ── reprojection between calibrations             │
//! │  direction ── precomputed unprojection tables            │
//! │                                                          │
//! │  engine ── boundary trait, RawRef addresses, Handle      │
//! │            ownership; MemoryEngine reference impl        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Building a record:
//!
//! ```
//! use rgbdrec::{
//!     engine_ref, CameraCalibration, MemoryEngine, RecordBuilder, UndistortedCalibration,
//!     VideoFrame,
//! };
//!
//! let engine = engine_ref(MemoryEngine::new());
//! let mut builder = RecordBuilder::new();
//! builder.set_calibration(CameraCalibration::Undistorted(UndistortedCalibration {
//!     color_width: 640,
//!     color_height: 480,
//!     depth_width: 320,
//!     depth_height: 240,
//!     fx: 500.0,
//!     fy: 500.0,
//!     cx: 320.0,
//!     cy: 240.0,
//! }));
//! builder.add_video_frame(VideoFrame::new(0, true, vec![], vec![]));
//! let bytes = builder.build(&engine).unwrap();
//! assert!(!bytes.is_empty());
//! ```

pub mod builder;
pub mod calibration;
pub mod direction;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod handle;
pub mod mapper;
pub mod parser;
pub mod record;

pub use builder::RecordBuilder;
pub use calibration::{
    CameraCalibration, CameraDeviceType, IosCalibration, KinectCalibration, UndistortedCalibration,
};
pub use direction::DirectionTable;
pub use engine::memory::MemoryEngine;
pub use engine::{engine_ref, EngineRef, RawRef, RecordingEngine, WriterSettings};
pub use error::Error;
pub use frame::{
    AudioFrame, CalibrationChangeFrame, ImuFrame, Int32Frame, PoseFrame, VideoFrame, YuvFrame,
};
pub use geometry::{Plane, Quaternion, Vector2, Vector3};
pub use handle::Handle;
pub use mapper::FrameMapper;
pub use parser::RecordParser;
pub use record::{
    AudioTrack, ColorCodecType, ColorVideoTrack, DepthCodecType, DepthVideoTrack, Record,
    RecordAttachments, RecordInfo, RecordMetadata, RecordTracks, AUDIO_SAMPLE_RATE,
    DEFAULT_DEPTH_UNIT, VIDEO_FRAME_RATE,
};
