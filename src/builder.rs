//! Record builder: multiplexes independent frame streams into one container
//!
//! Frames of the five kinds arrive in any order and any quantity. `build`
//! stable-sorts each stream, re-bases all timestamps against the earliest
//! one seen anywhere, and interleaves the streams with video as the
//! backbone: every auxiliary frame is written before the first video frame
//! at or after it. That keeps the container locally coherent for streaming
//! playback; a reader never needs auxiliary frames from far ahead to render
//! the current video frame.
//!
//! Auxiliary frames timestamped after the last video frame are flushed at
//! the end rather than dropped, so no added frame is ever lost.

use crate::calibration::CameraCalibration;
use crate::engine::{EngineRef, WriterSettings};
use crate::error::Error;
use crate::frame::{AudioFrame, CalibrationChangeFrame, ImuFrame, PoseFrame, VideoFrame};
use crate::handle::Handle;
use crate::record::{DepthCodecType, AUDIO_SAMPLE_RATE, DEFAULT_DEPTH_UNIT};

/// Accumulates frames and settings, then builds a container through an engine
pub struct RecordBuilder {
    sample_rate: i32,
    depth_codec_type: DepthCodecType,
    depth_unit: f32,
    calibration: Option<CameraCalibration>,
    cover_png: Option<Vec<u8>>,
    video_frames: Vec<VideoFrame>,
    audio_frames: Vec<AudioFrame>,
    imu_frames: Vec<ImuFrame>,
    pose_frames: Vec<PoseFrame>,
    calibration_frames: Vec<CalibrationChangeFrame>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            sample_rate: AUDIO_SAMPLE_RATE,
            depth_codec_type: DepthCodecType::Tdc1,
            depth_unit: DEFAULT_DEPTH_UNIT,
            calibration: None,
            cover_png: None,
            video_frames: Vec::new(),
            audio_frames: Vec::new(),
            imu_frames: Vec::new(),
            pose_frames: Vec::new(),
            calibration_frames: Vec::new(),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: i32) {
        self.sample_rate = sample_rate;
    }

    pub fn set_depth_codec_type(&mut self, depth_codec_type: DepthCodecType) {
        self.depth_codec_type = depth_codec_type;
    }

    pub fn set_depth_unit(&mut self, depth_unit: f32) {
        self.depth_unit = depth_unit;
    }

    /// Set the camera calibration. Required before [`RecordBuilder::build`].
    pub fn set_calibration(&mut self, calibration: CameraCalibration) {
        self.calibration = Some(calibration);
    }

    pub fn set_cover_png(&mut self, cover_png: Option<Vec<u8>>) {
        self.cover_png = cover_png;
    }

    pub fn add_video_frame(&mut self, frame: VideoFrame) {
        self.video_frames.push(frame);
    }

    pub fn add_audio_frame(&mut self, frame: AudioFrame) {
        self.audio_frames.push(frame);
    }

    pub fn add_imu_frame(&mut self, frame: ImuFrame) {
        self.imu_frames.push(frame);
    }

    pub fn add_pose_frame(&mut self, frame: PoseFrame) {
        self.pose_frames.push(frame);
    }

    pub fn add_calibration_frame(&mut self, frame: CalibrationChangeFrame) {
        self.calibration_frames.push(frame);
    }

    /// Interleave all added frames and build the container bytes.
    ///
    /// Fails with [`Error::MissingCalibration`] if no calibration was set;
    /// this is checked before any engine call.
    pub fn build(&mut self, engine: &EngineRef) -> Result<Vec<u8>, Error> {
        // Stable sorts: equal timestamps keep insertion order, which within
        // a stream reflects acquisition order.
        self.video_frames.sort_by_key(|f| f.time_point_us);
        self.audio_frames.sort_by_key(|f| f.time_point_us);
        self.imu_frames.sort_by_key(|f| f.time_point_us);
        self.pose_frames.sort_by_key(|f| f.time_point_us);
        self.calibration_frames.sort_by_key(|f| f.time_point_us);

        let calibration = self.calibration.as_ref().ok_or(Error::MissingCalibration)?;

        let calibration_handle = calibration.to_native(engine)?;
        let settings = WriterSettings {
            sample_rate: self.sample_rate,
            depth_codec_type: self.depth_codec_type,
            depth_unit: self.depth_unit,
        };
        let writer_addr = engine.borrow_mut().create_writer(
            &settings,
            calibration_handle.addr(),
            self.cover_png.as_deref(),
        );
        if !writer_addr.is_valid() {
            return Err(Error::Engine("engine rejected writer construction".into()));
        }
        let writer = Handle::owned(engine.clone(), writer_addr);

        // Re-base all timestamps so the container starts near zero,
        // whatever absolute clock the frames were tagged with.
        let epoch = self
            .video_frames
            .first()
            .map(|f| f.time_point_us)
            .into_iter()
            .chain(self.audio_frames.first().map(|f| f.time_point_us))
            .chain(self.imu_frames.first().map(|f| f.time_point_us))
            .chain(self.pose_frames.first().map(|f| f.time_point_us))
            .chain(self.calibration_frames.first().map(|f| f.time_point_us))
            .min()
            .unwrap_or(0);

        if self.video_frames.is_empty() {
            log::info!("no video frames added; writing auxiliary streams only");
        }

        let mut audio_index = 0;
        let mut imu_index = 0;
        let mut pose_index = 0;
        let mut calibration_index = 0;

        let mut engine = engine.borrow_mut();
        for video_frame in &self.video_frames {
            let video_time_point_us = video_frame.time_point_us;

            while audio_index < self.audio_frames.len() {
                let frame = &self.audio_frames[audio_index];
                if frame.time_point_us > video_time_point_us {
                    break;
                }
                engine.write_audio_frame(
                    writer.addr(),
                    &AudioFrame {
                        time_point_us: frame.time_point_us - epoch,
                        ..frame.clone()
                    },
                );
                audio_index += 1;
            }
            while imu_index < self.imu_frames.len() {
                let frame = &self.imu_frames[imu_index];
                if frame.time_point_us > video_time_point_us {
                    break;
                }
                engine.write_imu_frame(
                    writer.addr(),
                    &ImuFrame {
                        time_point_us: frame.time_point_us - epoch,
                        ..frame.clone()
                    },
                );
                imu_index += 1;
            }
            while pose_index < self.pose_frames.len() {
                let frame = &self.pose_frames[pose_index];
                if frame.time_point_us > video_time_point_us {
                    break;
                }
                engine.write_pose_frame(
                    writer.addr(),
                    &PoseFrame {
                        time_point_us: frame.time_point_us - epoch,
                        ..frame.clone()
                    },
                );
                pose_index += 1;
            }
            while calibration_index < self.calibration_frames.len() {
                let frame = &self.calibration_frames[calibration_index];
                if frame.time_point_us > video_time_point_us {
                    break;
                }
                engine.write_calibration_frame(
                    writer.addr(),
                    &CalibrationChangeFrame {
                        time_point_us: frame.time_point_us - epoch,
                        calibration: frame.calibration.clone(),
                    },
                );
                calibration_index += 1;
            }

            engine.write_video_frame(
                writer.addr(),
                &VideoFrame {
                    time_point_us: video_time_point_us - epoch,
                    ..video_frame.clone()
                },
            );
        }

        // Flush auxiliary frames timestamped after the last video frame.
        for frame in &self.audio_frames[audio_index..] {
            engine.write_audio_frame(
                writer.addr(),
                &AudioFrame {
                    time_point_us: frame.time_point_us - epoch,
                    ..frame.clone()
                },
            );
        }
        for frame in &self.imu_frames[imu_index..] {
            engine.write_imu_frame(
                writer.addr(),
                &ImuFrame {
                    time_point_us: frame.time_point_us - epoch,
                    ..frame.clone()
                },
            );
        }
        for frame in &self.pose_frames[pose_index..] {
            engine.write_pose_frame(
                writer.addr(),
                &PoseFrame {
                    time_point_us: frame.time_point_us - epoch,
                    ..frame.clone()
                },
            );
        }
        for frame in &self.calibration_frames[calibration_index..] {
            engine.write_calibration_frame(
                writer.addr(),
                &CalibrationChangeFrame {
                    time_point_us: frame.time_point_us - epoch,
                    calibration: frame.calibration.clone(),
                },
            );
        }

        engine
            .finalize_writer(writer.addr())
            .ok_or_else(|| Error::Engine("engine failed to finalize writer".into()))
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::UndistortedCalibration;
    use crate::engine::{engine_ref, RawRef, RecordingEngine};
    use crate::frame::{Int32Frame, YuvFrame};
    use crate::geometry::{Quaternion, Vector3};
    use crate::record::{RecordInfo, RecordTracks};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn calibration() -> CameraCalibration {
        CameraCalibration::Undistorted(UndistortedCalibration {
            color_width: 640,
            color_height: 480,
            depth_width: 320,
            depth_height: 240,
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
        })
    }

    fn imu_frame(time_point_us: u64) -> ImuFrame {
        ImuFrame::new(
            time_point_us,
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
        )
    }

    fn pose_frame(time_point_us: u64) -> PoseFrame {
        PoseFrame::new(
            time_point_us,
            Vector3::zeros(),
            Quaternion::new(1.0, 0.0, 0.0, 0.0),
        )
    }

    /// One recorded engine write: stream kind, re-based timestamp, and the
    /// first payload byte for identity checks.
    type Write = (&'static str, u64, u8);

    /// Engine double that records the order of write calls
    struct ProbeEngine {
        writes: Rc<RefCell<Vec<Write>>>,
    }

    impl RecordingEngine for ProbeEngine {
        fn create_calibration(&mut self, _device_type: i32, _json: &[u8]) -> RawRef {
            RawRef(1)
        }
        fn calibration_device_type(&self, _calibration: RawRef) -> i32 {
            -1
        }
        fn calibration_json(&self, _calibration: RawRef) -> Option<Vec<u8>> {
            None
        }
        fn create_writer(
            &mut self,
            _settings: &WriterSettings,
            _calibration: RawRef,
            _cover_png: Option<&[u8]>,
        ) -> RawRef {
            RawRef(2)
        }
        fn write_video_frame(&mut self, _writer: RawRef, frame: &VideoFrame) {
            let byte = frame.color_bytes.first().copied().unwrap_or(0);
            self.writes
                .borrow_mut()
                .push(("video", frame.time_point_us, byte));
        }
        fn write_audio_frame(&mut self, _writer: RawRef, frame: &AudioFrame) {
            let byte = frame.bytes.first().copied().unwrap_or(0);
            self.writes
                .borrow_mut()
                .push(("audio", frame.time_point_us, byte));
        }
        fn write_imu_frame(&mut self, _writer: RawRef, frame: &ImuFrame) {
            self.writes
                .borrow_mut()
                .push(("imu", frame.time_point_us, 0));
        }
        fn write_pose_frame(&mut self, _writer: RawRef, frame: &PoseFrame) {
            self.writes
                .borrow_mut()
                .push(("pose", frame.time_point_us, 0));
        }
        fn write_calibration_frame(&mut self, _writer: RawRef, frame: &CalibrationChangeFrame) {
            self.writes
                .borrow_mut()
                .push(("calibration", frame.time_point_us, 0));
        }
        fn finalize_writer(&mut self, _writer: RawRef) -> Option<Vec<u8>> {
            Some(Vec::new())
        }
        fn create_parser(&mut self, _bytes: &[u8]) -> RawRef {
            RawRef::INVALID
        }
        fn parse_record(&mut self, _parser: RawRef, _with_frames: bool) -> RawRef {
            RawRef::INVALID
        }
        fn record_info(&self, _record: RawRef) -> Option<RecordInfo> {
            None
        }
        fn record_tracks(&self, _record: RawRef) -> Option<RecordTracks> {
            None
        }
        fn record_cover_png(&self, _record: RawRef) -> Option<Vec<u8>> {
            None
        }
        fn record_calibration(&self, _record: RawRef) -> Option<RawRef> {
            None
        }
        fn record_video_frames(&self, _record: RawRef) -> Option<Vec<VideoFrame>> {
            None
        }
        fn record_audio_frames(&self, _record: RawRef) -> Option<Vec<AudioFrame>> {
            None
        }
        fn record_imu_frames(&self, _record: RawRef) -> Option<Vec<ImuFrame>> {
            None
        }
        fn record_pose_frames(&self, _record: RawRef) -> Option<Vec<PoseFrame>> {
            None
        }
        fn record_calibration_frames(
            &self,
            _record: RawRef,
        ) -> Option<Vec<CalibrationChangeFrame>> {
            None
        }
        fn create_mapper(&mut self, _src: RawRef, _dst: RawRef) -> RawRef {
            RawRef::INVALID
        }
        fn map_color_frame(&self, _mapper: RawRef, _frame: &YuvFrame) -> Option<YuvFrame> {
            None
        }
        fn map_depth_frame(&self, _mapper: RawRef, _frame: &Int32Frame) -> Option<Int32Frame> {
            None
        }
        fn release(&mut self, _addr: RawRef) {}
    }

    fn probe() -> (Rc<RefCell<Vec<Write>>>, EngineRef) {
        let writes = Rc::new(RefCell::new(Vec::new()));
        let engine = engine_ref(ProbeEngine {
            writes: writes.clone(),
        });
        (writes, engine)
    }

    #[test]
    fn test_build_without_calibration_fails() {
        let (writes, engine) = probe();
        let mut builder = RecordBuilder::new();
        builder.add_video_frame(VideoFrame::new(0, true, vec![], vec![]));
        assert_eq!(builder.build(&engine), Err(Error::MissingCalibration));
        assert!(writes.borrow().is_empty());
    }

    #[test]
    fn test_merge_order_and_epoch_rebase() {
        let (writes, engine) = probe();
        let mut builder = RecordBuilder::new();
        builder.set_calibration(calibration());
        builder.add_video_frame(VideoFrame::new(1000, true, vec![], vec![]));
        builder.add_audio_frame(AudioFrame::new(1500, vec![]));
        builder.add_audio_frame(AudioFrame::new(500, vec![]));
        builder.add_imu_frame(imu_frame(900));
        builder.add_pose_frame(pose_frame(1100));

        builder.build(&engine).unwrap();

        // Epoch is the earliest timestamp anywhere (the audio frame at 500).
        // Audio/IMU at or before the video frame drain first; frames after
        // the last video frame flush at the end.
        let writes = writes.borrow();
        let order: Vec<(&str, u64)> = writes.iter().map(|w| (w.0, w.1)).collect();
        assert_eq!(
            order,
            vec![
                ("audio", 0),
                ("imu", 400),
                ("video", 500),
                ("audio", 1000),
                ("pose", 600),
            ]
        );
    }

    #[test]
    fn test_first_emitted_frame_rebases_to_zero() {
        let (writes, engine) = probe();
        let mut builder = RecordBuilder::new();
        builder.set_calibration(calibration());
        builder.add_video_frame(VideoFrame::new(7_000_000, true, vec![], vec![]));
        builder.add_pose_frame(pose_frame(6_500_000));

        builder.build(&engine).unwrap();

        let writes = writes.borrow();
        assert_eq!(writes[0], ("pose", 0, 0));
        assert_eq!(writes[1], ("video", 500_000, 0));
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let (writes, engine) = probe();
        let mut builder = RecordBuilder::new();
        builder.set_calibration(calibration());
        builder.add_video_frame(VideoFrame::new(10, true, vec![], vec![]));
        builder.add_audio_frame(AudioFrame::new(5, vec![1]));
        builder.add_audio_frame(AudioFrame::new(5, vec![2]));
        builder.add_audio_frame(AudioFrame::new(5, vec![3]));

        builder.build(&engine).unwrap();

        let writes = writes.borrow();
        let audio_payloads: Vec<u8> = writes
            .iter()
            .filter(|w| w.0 == "audio")
            .map(|w| w.2)
            .collect();
        assert_eq!(audio_payloads, vec![1, 2, 3]);
    }

    #[test]
    fn test_no_video_frames_still_flushes_streams() {
        let (writes, engine) = probe();
        let mut builder = RecordBuilder::new();
        builder.set_calibration(calibration());
        builder.add_audio_frame(AudioFrame::new(300, vec![]));
        builder.add_imu_frame(imu_frame(100));

        builder.build(&engine).unwrap();

        let writes = writes.borrow();
        let order: Vec<(&str, u64)> = writes.iter().map(|w| (w.0, w.1)).collect();
        assert_eq!(order, vec![("audio", 200), ("imu", 0)]);
    }

    #[test]
    fn test_multiple_video_frames_drain_in_batches() {
        let (writes, engine) = probe();
        let mut builder = RecordBuilder::new();
        builder.set_calibration(calibration());
        builder.add_video_frame(VideoFrame::new(100, true, vec![], vec![]));
        builder.add_video_frame(VideoFrame::new(200, false, vec![], vec![]));
        builder.add_audio_frame(AudioFrame::new(100, vec![]));
        builder.add_audio_frame(AudioFrame::new(150, vec![]));
        builder.add_audio_frame(AudioFrame::new(250, vec![]));

        builder.build(&engine).unwrap();

        let writes = writes.borrow();
        let order: Vec<(&str, u64)> = writes.iter().map(|w| (w.0, w.1)).collect();
        assert_eq!(
            order,
            vec![
                ("audio", 0),
                ("video", 0),
                ("audio", 50),
                ("video", 100),
                ("audio", 150),
            ]
        );
    }
}
