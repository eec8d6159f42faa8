//! In-memory reference engine
//!
//! A pure-Rust implementation of [`RecordingEngine`] with no codecs and no
//! native code. It keeps engine-side objects in an addressable arena and
//! serializes records into a self-describing byte format:
//!
//! ```text
//! "RGBD" ‖ version: u8 ‖ header length: u32 LE ‖ header ‖ frames
//! ```
//!
//! where header and frames are bincode-encoded. Metadata-only parsing reads
//! just the header region, so its cost is independent of frame payloads.
//!
//! The container format is this engine's own; it is not the physical layout
//! native engines write. Use it for tests, tooling, and hosts that exchange
//! records without a native library.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::calibration::{CameraCalibration, CameraDeviceType};
use crate::frame::{
    AudioFrame, CalibrationChangeFrame, ImuFrame, Int32Frame, PoseFrame, VideoFrame, YuvFrame,
};
use crate::mapper::MappingTables;
use crate::record::{
    AudioTrack, ColorCodecType, ColorVideoTrack, DepthVideoTrack, RecordInfo, RecordTracks,
};

use super::{RawRef, RecordingEngine, WriterSettings};

const CONTAINER_MAGIC: &[u8; 4] = b"RGBD";
const CONTAINER_VERSION: u8 = 1;
const PREAMBLE_LEN: usize = 9; // magic + version + header length

/// Matroska-convention timecode scale: 1 ms expressed in nanoseconds
const TIMECODE_SCALE_NS: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContainerHeader {
    info: RecordInfo,
    tracks: RecordTracks,
    calibration: CameraCalibration,
    cover_png: Option<Vec<u8>>,
}

/// One interleaved frame in written order
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ContainerFrame {
    Video(VideoFrame),
    Audio(AudioFrame),
    Imu(ImuFrame),
    Pose(PoseFrame),
    Calibration(CalibrationChangeFrame),
}

struct WriterState {
    settings: WriterSettings,
    calibration: CameraCalibration,
    cover_png: Option<Vec<u8>>,
    frames: Vec<ContainerFrame>,
    last_time_point_us: u64,
}

struct ParserState {
    header: ContainerHeader,
    frame_bytes: Vec<u8>,
}

struct RecordState {
    header: ContainerHeader,
    /// Attachment calibration object, owned by this record
    calibration_addr: RawRef,
    video_frames: Vec<VideoFrame>,
    audio_frames: Vec<AudioFrame>,
    imu_frames: Vec<ImuFrame>,
    pose_frames: Vec<PoseFrame>,
    calibration_frames: Vec<CalibrationChangeFrame>,
}

enum EngineObject {
    Calibration(CameraCalibration),
    Writer(WriterState),
    Parser(ParserState),
    Record(RecordState),
    Mapper(MappingTables),
}

/// In-memory [`RecordingEngine`] implementation
pub struct MemoryEngine {
    objects: HashMap<i64, EngineObject>,
    next_addr: i64,
    release_calls: u64,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_addr: 1,
            release_calls: 0,
        }
    }

    /// How many times [`RecordingEngine::release`] has been called.
    ///
    /// The handle protocol promises at most one release per owned object;
    /// tests observe that promise through this counter.
    pub fn release_calls(&self) -> u64 {
        self.release_calls
    }

    /// Number of live objects in the arena
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    fn insert(&mut self, object: EngineObject) -> RawRef {
        let addr = self.next_addr;
        self.next_addr += 1;
        self.objects.insert(addr, object);
        RawRef(addr)
    }

    fn calibration(&self, addr: RawRef) -> Option<&CameraCalibration> {
        match self.objects.get(&addr.0) {
            Some(EngineObject::Calibration(calibration)) => Some(calibration),
            _ => None,
        }
    }

    fn writer_mut(&mut self, addr: RawRef) -> Option<&mut WriterState> {
        match self.objects.get_mut(&addr.0) {
            Some(EngineObject::Writer(writer)) => Some(writer),
            _ => {
                log::warn!("no writer object at engine address {}", addr.0);
                None
            }
        }
    }

    fn record(&self, addr: RawRef) -> Option<&RecordState> {
        match self.objects.get(&addr.0) {
            Some(EngineObject::Record(record)) => Some(record),
            _ => None,
        }
    }

    fn push_frame(&mut self, writer: RawRef, frame: ContainerFrame, time_point_us: u64) {
        if let Some(writer) = self.writer_mut(writer) {
            writer.last_time_point_us = writer.last_time_point_us.max(time_point_us);
            writer.frames.push(frame);
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Split container bytes into header and frame regions, validating the
/// preamble. Everything that can be rejected cheaply is rejected here.
fn split_container(bytes: &[u8]) -> Result<(ContainerHeader, &[u8]), String> {
    if bytes.len() < PREAMBLE_LEN {
        return Err(format!("container too short: {} bytes", bytes.len()));
    }
    if &bytes[..4] != CONTAINER_MAGIC {
        return Err("bad container magic".into());
    }
    if bytes[4] != CONTAINER_VERSION {
        return Err(format!("unknown container version {}", bytes[4]));
    }
    let header_len = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
    let Some(frame_offset) = PREAMBLE_LEN.checked_add(header_len) else {
        return Err("header length overflow".into());
    };
    if frame_offset > bytes.len() {
        return Err(format!(
            "header length {} exceeds container size {}",
            header_len,
            bytes.len()
        ));
    }
    let header: ContainerHeader = bincode::deserialize(&bytes[PREAMBLE_LEN..frame_offset])
        .map_err(|e| format!("header decode failed: {}", e))?;
    Ok((header, &bytes[frame_offset..]))
}

impl RecordingEngine for MemoryEngine {
    fn create_calibration(&mut self, device_type: i32, json: &[u8]) -> RawRef {
        let Ok(device_type) = CameraDeviceType::try_from(device_type) else {
            return RawRef::INVALID;
        };
        let decoded = match device_type {
            CameraDeviceType::AzureKinect => {
                serde_json::from_slice(json).map(CameraCalibration::AzureKinect)
            }
            CameraDeviceType::Ios => serde_json::from_slice(json).map(CameraCalibration::Ios),
            CameraDeviceType::Undistorted => {
                serde_json::from_slice(json).map(CameraCalibration::Undistorted)
            }
        };
        match decoded {
            Ok(calibration) => self.insert(EngineObject::Calibration(calibration)),
            Err(e) => {
                log::warn!("calibration construction rejected: {}", e);
                RawRef::INVALID
            }
        }
    }

    fn calibration_device_type(&self, calibration: RawRef) -> i32 {
        match self.calibration(calibration) {
            Some(calibration) => calibration.device_type() as i32,
            None => -1,
        }
    }

    fn calibration_json(&self, calibration: RawRef) -> Option<Vec<u8>> {
        let json = match self.calibration(calibration)? {
            CameraCalibration::AzureKinect(c) => serde_json::to_vec(c),
            CameraCalibration::Ios(c) => serde_json::to_vec(c),
            CameraCalibration::Undistorted(c) => serde_json::to_vec(c),
        };
        json.ok()
    }

    fn create_writer(
        &mut self,
        settings: &WriterSettings,
        calibration: RawRef,
        cover_png: Option<&[u8]>,
    ) -> RawRef {
        let Some(calibration) = self.calibration(calibration).cloned() else {
            return RawRef::INVALID;
        };
        self.insert(EngineObject::Writer(WriterState {
            settings: settings.clone(),
            calibration,
            cover_png: cover_png.map(|b| b.to_vec()),
            frames: Vec::new(),
            last_time_point_us: 0,
        }))
    }

    fn write_video_frame(&mut self, writer: RawRef, frame: &VideoFrame) {
        self.push_frame(
            writer,
            ContainerFrame::Video(frame.clone()),
            frame.time_point_us,
        );
    }

    fn write_audio_frame(&mut self, writer: RawRef, frame: &AudioFrame) {
        self.push_frame(
            writer,
            ContainerFrame::Audio(frame.clone()),
            frame.time_point_us,
        );
    }

    fn write_imu_frame(&mut self, writer: RawRef, frame: &ImuFrame) {
        self.push_frame(
            writer,
            ContainerFrame::Imu(frame.clone()),
            frame.time_point_us,
        );
    }

    fn write_pose_frame(&mut self, writer: RawRef, frame: &PoseFrame) {
        self.push_frame(
            writer,
            ContainerFrame::Pose(frame.clone()),
            frame.time_point_us,
        );
    }

    fn write_calibration_frame(&mut self, writer: RawRef, frame: &CalibrationChangeFrame) {
        self.push_frame(
            writer,
            ContainerFrame::Calibration(frame.clone()),
            frame.time_point_us,
        );
    }

    fn finalize_writer(&mut self, writer: RawRef) -> Option<Vec<u8>> {
        let writer = self.writer_mut(writer)?;
        let header = ContainerHeader {
            info: RecordInfo {
                timecode_scale_ns: TIMECODE_SCALE_NS,
                duration_us: writer.last_time_point_us as f64,
                writing_app: format!("rgbdrec {}", env!("CARGO_PKG_VERSION")),
            },
            tracks: RecordTracks {
                color: ColorVideoTrack {
                    track_number: 1,
                    width: writer.calibration.color_width(),
                    height: writer.calibration.color_height(),
                    codec: ColorCodecType::Vp8,
                },
                depth: DepthVideoTrack {
                    track_number: 2,
                    width: writer.calibration.depth_width(),
                    height: writer.calibration.depth_height(),
                    codec: writer.settings.depth_codec_type,
                    depth_unit: writer.settings.depth_unit,
                },
                audio: AudioTrack {
                    track_number: 3,
                    sampling_frequency: writer.settings.sample_rate as f64,
                },
            },
            calibration: writer.calibration.clone(),
            cover_png: writer.cover_png.clone(),
        };

        let header_bytes = match bincode::serialize(&header) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("header encode failed: {}", e);
                return None;
            }
        };
        let frame_bytes = match bincode::serialize(&writer.frames) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("frame encode failed: {}", e);
                return None;
            }
        };

        let mut bytes =
            Vec::with_capacity(PREAMBLE_LEN + header_bytes.len() + frame_bytes.len());
        bytes.extend_from_slice(CONTAINER_MAGIC);
        bytes.push(CONTAINER_VERSION);
        bytes.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&header_bytes);
        bytes.extend_from_slice(&frame_bytes);
        Some(bytes)
    }

    fn create_parser(&mut self, bytes: &[u8]) -> RawRef {
        match split_container(bytes) {
            Ok((header, frame_bytes)) => self.insert(EngineObject::Parser(ParserState {
                header,
                frame_bytes: frame_bytes.to_vec(),
            })),
            Err(reason) => {
                log::debug!("parser construction rejected: {}", reason);
                RawRef::INVALID
            }
        }
    }

    fn parse_record(&mut self, parser: RawRef, with_frames: bool) -> RawRef {
        let Some(EngineObject::Parser(parser)) = self.objects.get(&parser.0) else {
            return RawRef::INVALID;
        };
        let header = parser.header.clone();

        let mut video_frames = Vec::new();
        let mut audio_frames = Vec::new();
        let mut imu_frames = Vec::new();
        let mut pose_frames = Vec::new();
        let mut calibration_frames = Vec::new();
        if with_frames {
            let frames: Vec<ContainerFrame> = match bincode::deserialize(&parser.frame_bytes) {
                Ok(frames) => frames,
                Err(e) => {
                    log::debug!("frame decode failed: {}", e);
                    return RawRef::INVALID;
                }
            };
            for frame in frames {
                match frame {
                    ContainerFrame::Video(f) => video_frames.push(f),
                    ContainerFrame::Audio(f) => audio_frames.push(f),
                    ContainerFrame::Imu(f) => imu_frames.push(f),
                    ContainerFrame::Pose(f) => pose_frames.push(f),
                    ContainerFrame::Calibration(f) => calibration_frames.push(f),
                }
            }
        }

        let calibration_addr =
            self.insert(EngineObject::Calibration(header.calibration.clone()));
        self.insert(EngineObject::Record(RecordState {
            header,
            calibration_addr,
            video_frames,
            audio_frames,
            imu_frames,
            pose_frames,
            calibration_frames,
        }))
    }

    fn record_info(&self, record: RawRef) -> Option<RecordInfo> {
        self.record(record).map(|r| r.header.info.clone())
    }

    fn record_tracks(&self, record: RawRef) -> Option<RecordTracks> {
        self.record(record).map(|r| r.header.tracks.clone())
    }

    fn record_cover_png(&self, record: RawRef) -> Option<Vec<u8>> {
        self.record(record).and_then(|r| r.header.cover_png.clone())
    }

    fn record_calibration(&self, record: RawRef) -> Option<RawRef> {
        self.record(record).map(|r| r.calibration_addr)
    }

    fn record_video_frames(&self, record: RawRef) -> Option<Vec<VideoFrame>> {
        self.record(record).map(|r| r.video_frames.clone())
    }

    fn record_audio_frames(&self, record: RawRef) -> Option<Vec<AudioFrame>> {
        self.record(record).map(|r| r.audio_frames.clone())
    }

    fn record_imu_frames(&self, record: RawRef) -> Option<Vec<ImuFrame>> {
        self.record(record).map(|r| r.imu_frames.clone())
    }

    fn record_pose_frames(&self, record: RawRef) -> Option<Vec<PoseFrame>> {
        self.record(record).map(|r| r.pose_frames.clone())
    }

    fn record_calibration_frames(&self, record: RawRef) -> Option<Vec<CalibrationChangeFrame>> {
        self.record(record).map(|r| r.calibration_frames.clone())
    }

    fn create_mapper(&mut self, src_calibration: RawRef, dst_calibration: RawRef) -> RawRef {
        let (Some(src), Some(dst)) = (
            self.calibration(src_calibration),
            self.calibration(dst_calibration),
        ) else {
            return RawRef::INVALID;
        };
        let tables = MappingTables::new(src, dst);
        self.insert(EngineObject::Mapper(tables))
    }

    fn map_color_frame(&self, mapper: RawRef, frame: &YuvFrame) -> Option<YuvFrame> {
        match self.objects.get(&mapper.0) {
            Some(EngineObject::Mapper(tables)) => Some(tables.map_color(frame)),
            _ => None,
        }
    }

    fn map_depth_frame(&self, mapper: RawRef, frame: &Int32Frame) -> Option<Int32Frame> {
        match self.objects.get(&mapper.0) {
            Some(EngineObject::Mapper(tables)) => Some(tables.map_depth(frame)),
            _ => None,
        }
    }

    fn release(&mut self, addr: RawRef) {
        self.release_calls += 1;
        if let Some(EngineObject::Record(record)) = self.objects.remove(&addr.0) {
            // The record owns its attachment calibration.
            self.objects.remove(&record.calibration_addr.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::UndistortedCalibration;
    use crate::record::DepthCodecType;

    fn calibration_json() -> Vec<u8> {
        serde_json::to_vec(&UndistortedCalibration {
            color_width: 640,
            color_height: 480,
            depth_width: 320,
            depth_height: 240,
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        })
        .unwrap()
    }

    fn settings() -> WriterSettings {
        WriterSettings {
            sample_rate: 48_000,
            depth_codec_type: DepthCodecType::Tdc1,
            depth_unit: 0.001,
        }
    }

    fn build_container(engine: &mut MemoryEngine) -> Vec<u8> {
        let calibration = engine.create_calibration(2, &calibration_json());
        let writer = engine.create_writer(&settings(), calibration, None);
        engine.write_video_frame(writer, &VideoFrame::new(0, true, vec![1], vec![2]));
        engine.finalize_writer(writer).unwrap()
    }

    #[test]
    fn test_unknown_device_type_is_rejected() {
        let mut engine = MemoryEngine::new();
        assert_eq!(engine.create_calibration(9, &calibration_json()), RawRef::INVALID);
    }

    #[test]
    fn test_mismatched_calibration_payload_is_rejected() {
        let mut engine = MemoryEngine::new();
        // Discriminant 0 is AzureKinect, but the payload carries the
        // Undistorted field set.
        assert_eq!(engine.create_calibration(0, &calibration_json()), RawRef::INVALID);
    }

    #[test]
    fn test_container_roundtrip_through_trait() {
        let mut engine = MemoryEngine::new();
        let bytes = build_container(&mut engine);

        let parser = engine.create_parser(&bytes);
        assert!(parser.is_valid());
        let record = engine.parse_record(parser, true);
        assert!(record.is_valid());

        let info = engine.record_info(record).unwrap();
        assert_eq!(info.timecode_scale_ns, TIMECODE_SCALE_NS);
        let tracks = engine.record_tracks(record).unwrap();
        assert_eq!(tracks.color.width, 640);
        assert_eq!(tracks.depth.codec, DepthCodecType::Tdc1);
        assert_eq!(engine.record_video_frames(record).unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_containers_fail_at_construction() {
        let mut engine = MemoryEngine::new();
        assert_eq!(engine.create_parser(&[]), RawRef::INVALID);
        assert_eq!(engine.create_parser(b"RGB"), RawRef::INVALID);
        assert_eq!(engine.create_parser(b"WRONG-MAGIC-BYTES"), RawRef::INVALID);

        // Valid preamble claiming a header longer than the container.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(CONTAINER_MAGIC);
        bytes.push(CONTAINER_VERSION);
        bytes.extend_from_slice(&1000u32.to_le_bytes());
        assert_eq!(engine.create_parser(&bytes), RawRef::INVALID);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let mut engine = MemoryEngine::new();
        let mut bytes = build_container(&mut engine);
        bytes[4] = CONTAINER_VERSION + 1;
        assert_eq!(engine.create_parser(&bytes), RawRef::INVALID);
    }

    #[test]
    fn test_truncated_frames_fail_at_parse() {
        let mut engine = MemoryEngine::new();
        let bytes = build_container(&mut engine);
        let truncated = &bytes[..bytes.len() - 1];

        let parser = engine.create_parser(truncated);
        assert!(parser.is_valid());
        // Metadata does not touch the frame region.
        assert!(engine.parse_record(parser, false).is_valid());
        assert_eq!(engine.parse_record(parser, true), RawRef::INVALID);
    }

    #[test]
    fn test_record_release_removes_owned_calibration() {
        let mut engine = MemoryEngine::new();
        let bytes = build_container(&mut engine);
        let parser = engine.create_parser(&bytes);
        let record = engine.parse_record(parser, false);
        let calibration = engine.record_calibration(record).unwrap();
        assert!(engine.calibration(calibration).is_some());

        engine.release(record);
        assert!(engine.calibration(calibration).is_none());
    }

    #[test]
    fn test_writes_to_unknown_writer_are_ignored() {
        let mut engine = MemoryEngine::new();
        engine.write_audio_frame(RawRef(99), &AudioFrame::new(0, vec![1, 2]));
        assert_eq!(engine.live_objects(), 0);
    }
}
