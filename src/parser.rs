//! Two-phase record parsing
//!
//! A [`RecordParser`] validates container bytes once at construction, then
//! serves any number of parses over them. The two phases are distinct types:
//! [`parse_metadata`](RecordParser::parse_metadata) returns a
//! [`RecordMetadata`] without ever touching the frame region, so inspecting
//! duration, resolution, and codecs of a large file stays cheap;
//! [`parse`](RecordParser::parse) materializes the full [`Record`].

use crate::calibration::CameraCalibration;
use crate::direction::DirectionTable;
use crate::engine::EngineRef;
use crate::error::Error;
use crate::handle::Handle;
use crate::record::{Record, RecordAttachments, RecordMetadata};

/// Parser over one container's bytes
pub struct RecordParser {
    engine: EngineRef,
    handle: Handle,
}

impl RecordParser {
    /// Validate the container bytes and construct a parser over them.
    ///
    /// Fails with [`Error::MalformedContainer`] when the bytes are not a
    /// container this engine can read. Frame payload corruption is not
    /// detected here; it surfaces in [`RecordParser::parse`].
    pub fn new(engine: &EngineRef, bytes: &[u8]) -> Result<Self, Error> {
        let addr = engine.borrow_mut().create_parser(bytes);
        if !addr.is_valid() {
            return Err(Error::MalformedContainer(
                "engine rejected container bytes".into(),
            ));
        }
        Ok(Self {
            engine: engine.clone(),
            handle: Handle::owned(engine.clone(), addr),
        })
    }

    /// Read info, tracks, and attachments without decoding any frames.
    ///
    /// Cost is independent of the container's frame payloads.
    pub fn parse_metadata(&mut self) -> Result<RecordMetadata, Error> {
        let record = self.parse_record_handle(false)?;
        self.read_metadata(&record)
    }

    /// Decode the whole record, frames included.
    ///
    /// With `with_directions` a [`DirectionTable`] is derived from the
    /// attachment calibration over the depth grid.
    pub fn parse(&mut self, with_directions: bool) -> Result<Record, Error> {
        let record = self.parse_record_handle(true)?;
        let metadata = self.read_metadata(&record)?;

        let engine = self.engine.borrow();
        let addr = record.addr();
        let video_frames = engine
            .record_video_frames(addr)
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        let audio_frames = engine
            .record_audio_frames(addr)
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        let imu_frames = engine
            .record_imu_frames(addr)
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        let pose_frames = engine
            .record_pose_frames(addr)
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        let calibration_frames = engine
            .record_calibration_frames(addr)
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        drop(engine);

        let direction_table = with_directions
            .then(|| DirectionTable::from_calibration(&metadata.attachments.calibration));

        Ok(Record {
            metadata,
            video_frames,
            audio_frames,
            imu_frames,
            pose_frames,
            calibration_frames,
            direction_table,
        })
    }

    fn parse_record_handle(&mut self, with_frames: bool) -> Result<Handle, Error> {
        let addr = self
            .engine
            .borrow_mut()
            .parse_record(self.handle.addr(), with_frames);
        if !addr.is_valid() {
            return Err(Error::MalformedContainer(
                "record materialization failed".into(),
            ));
        }
        Ok(Handle::owned(self.engine.clone(), addr))
    }

    fn read_metadata(&self, record: &Handle) -> Result<RecordMetadata, Error> {
        let engine = self.engine.borrow();
        let info = engine
            .record_info(record.addr())
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        let tracks = engine
            .record_tracks(record.addr())
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        let cover_png = engine.record_cover_png(record.addr());
        let calibration_addr = engine
            .record_calibration(record.addr())
            .ok_or_else(|| Error::Engine("no record object at handle address".into()))?;
        drop(engine);

        // The record owns its attachment calibration; wrap it borrowed so
        // dropping the view never releases the object.
        let view = Handle::borrowed(self.engine.clone(), calibration_addr);
        let calibration = CameraCalibration::from_native(&self.engine, &view)?;

        Ok(RecordMetadata {
            info,
            tracks,
            attachments: RecordAttachments {
                calibration,
                cover_png,
            },
        })
    }
}
