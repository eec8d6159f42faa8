//! The recording engine boundary
//!
//! The heavy machinery of a recording - depth/color/audio codecs and the
//! physical container encoding - lives in a recording engine behind the
//! [`RecordingEngine`] trait. Engine-side objects are addressed by opaque
//! [`RawRef`] values; hosts never touch engine memory directly and manage
//! object lifetime through [`Handle`](crate::Handle)s.
//!
//! Calls are blocking and non-reentrant. The crate's concurrency model is
//! single-threaded: one builder or parser drives one engine at a time, so
//! the boundary needs ownership discipline but no locking.
//!
//! Implementations:
//! - [`memory::MemoryEngine`] - pure-Rust in-memory engine, the reference
//!   implementation used by tests and by hosts that need no native library
//! - native FFI engines, provided by embedding applications
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ host value types (frames, calibrations, records)        │
//! │   RecordBuilder ──┐                 ┌── RecordParser    │
//! │                   ▼                 ▼                   │
//! │            RecordingEngine trait (RawRef + Handle)      │
//! └───────────────────┬─────────────────┬───────────────────┘
//!                     ▼                 ▼
//!               MemoryEngine      native engine (FFI)
//! ```

pub mod memory;

use std::cell::RefCell;
use std::rc::Rc;

use crate::frame::{
    AudioFrame, CalibrationChangeFrame, ImuFrame, Int32Frame, PoseFrame, VideoFrame, YuvFrame,
};
use crate::record::{DepthCodecType, RecordInfo, RecordTracks};

/// Opaque address of an engine-side object.
///
/// Negative values are the engine's error sentinel; real objects always live
/// at non-negative addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRef(pub i64);

impl RawRef {
    /// The sentinel an engine returns when an operation fails
    pub const INVALID: RawRef = RawRef(-1);

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

/// Shared reference to an engine instance.
///
/// Single-threaded by design; the engine's memory arena is never touched
/// from more than one thread.
pub type EngineRef = Rc<RefCell<dyn RecordingEngine>>;

/// Wrap an engine value into an [`EngineRef`]
pub fn engine_ref<E: RecordingEngine + 'static>(engine: E) -> EngineRef {
    Rc::new(RefCell::new(engine))
}

/// Stream-level settings of a record writer
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    pub sample_rate: i32,
    pub depth_codec_type: DepthCodecType,
    pub depth_unit: f32,
}

/// The operations a recording engine provides.
///
/// Object-producing calls return [`RawRef::INVALID`] on failure; hosts map
/// the sentinel to an [`Error`](crate::Error). Accessors on existing objects
/// return `None` when the address does not refer to an object of the
/// expected kind, which only happens on host-side lifetime bugs.
pub trait RecordingEngine {
    // -------------------------------------------------------------------------
    // Calibration objects
    // -------------------------------------------------------------------------

    /// Construct a calibration object from its discriminant and the JSON
    /// encoding of that variant's field set. Returns an owned address.
    fn create_calibration(&mut self, device_type: i32, json: &[u8]) -> RawRef;

    /// Device-type discriminant of a calibration object
    fn calibration_device_type(&self, calibration: RawRef) -> i32;

    /// JSON encoding of a calibration object's field set
    fn calibration_json(&self, calibration: RawRef) -> Option<Vec<u8>>;

    // -------------------------------------------------------------------------
    // Record writing
    // -------------------------------------------------------------------------

    /// Open a writer for a new record. The calibration address is read
    /// during the call; the engine does not retain it.
    fn create_writer(
        &mut self,
        settings: &WriterSettings,
        calibration: RawRef,
        cover_png: Option<&[u8]>,
    ) -> RawRef;

    fn write_video_frame(&mut self, writer: RawRef, frame: &VideoFrame);
    fn write_audio_frame(&mut self, writer: RawRef, frame: &AudioFrame);
    fn write_imu_frame(&mut self, writer: RawRef, frame: &ImuFrame);
    fn write_pose_frame(&mut self, writer: RawRef, frame: &PoseFrame);
    fn write_calibration_frame(&mut self, writer: RawRef, frame: &CalibrationChangeFrame);

    /// Finish the record and return the container bytes
    fn finalize_writer(&mut self, writer: RawRef) -> Option<Vec<u8>>;

    // -------------------------------------------------------------------------
    // Record parsing
    // -------------------------------------------------------------------------

    /// Validate container bytes and construct a parser over them.
    /// Malformed input fails here, not at parse time.
    fn create_parser(&mut self, bytes: &[u8]) -> RawRef;

    /// Materialize a record object from a parser. With `with_frames` false
    /// only info, tracks, and attachments are read; the cost is independent
    /// of the frame payloads.
    fn parse_record(&mut self, parser: RawRef, with_frames: bool) -> RawRef;

    // -------------------------------------------------------------------------
    // Record accessors
    // -------------------------------------------------------------------------

    fn record_info(&self, record: RawRef) -> Option<RecordInfo>;
    fn record_tracks(&self, record: RawRef) -> Option<RecordTracks>;
    fn record_cover_png(&self, record: RawRef) -> Option<Vec<u8>>;

    /// Address of the record's attachment calibration.
    ///
    /// The record owns the returned object; hosts wrap the address in a
    /// borrowed [`Handle`](crate::Handle) and must not release it.
    fn record_calibration(&self, record: RawRef) -> Option<RawRef>;

    fn record_video_frames(&self, record: RawRef) -> Option<Vec<VideoFrame>>;
    fn record_audio_frames(&self, record: RawRef) -> Option<Vec<AudioFrame>>;
    fn record_imu_frames(&self, record: RawRef) -> Option<Vec<ImuFrame>>;
    fn record_pose_frames(&self, record: RawRef) -> Option<Vec<PoseFrame>>;
    fn record_calibration_frames(&self, record: RawRef) -> Option<Vec<CalibrationChangeFrame>>;

    // -------------------------------------------------------------------------
    // Frame mapping
    // -------------------------------------------------------------------------

    /// Precompute a reprojection context between two calibration objects.
    /// Both addresses are read during the call; the engine does not retain
    /// them.
    fn create_mapper(&mut self, src_calibration: RawRef, dst_calibration: RawRef) -> RawRef;

    fn map_color_frame(&self, mapper: RawRef, frame: &YuvFrame) -> Option<YuvFrame>;
    fn map_depth_frame(&self, mapper: RawRef, frame: &Int32Frame) -> Option<Int32Frame>;

    // -------------------------------------------------------------------------
    // Lifetime
    // -------------------------------------------------------------------------

    /// Release an engine-side object.
    ///
    /// Owning handles call this exactly once; the engine may reuse the
    /// address afterwards. Objects owned by a parent (the attachment
    /// calibration of a record) are released with their parent, never
    /// individually.
    fn release(&mut self, addr: RawRef);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_ref_sentinel() {
        assert!(!RawRef::INVALID.is_valid());
        assert!(!RawRef(-7).is_valid());
        assert!(RawRef(0).is_valid());
        assert!(RawRef(42).is_valid());
    }
}
