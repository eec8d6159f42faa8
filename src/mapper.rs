//! Geometric re-projection of decoded frames between calibrations
//!
//! A mapper precomputes, per destination pixel, which source pixel looks in
//! the same direction: unproject through the destination optics, reproject
//! through the source optics, round to the nearest pixel. Mapping a frame is
//! then a table lookup per pixel. The tables are fixed at construction; the
//! mapper is stateless with respect to frame content.

use crate::calibration::CameraCalibration;
use crate::engine::EngineRef;
use crate::error::Error;
use crate::frame::{Int32Frame, YuvFrame};
use crate::geometry::Vector2;
use crate::handle::Handle;

/// For each `from` pixel, the index of the `to` pixel seeing the same
/// direction, or `None` when the direction falls outside the `to` frame.
pub(crate) fn index_map(
    from: &CameraCalibration,
    from_width: usize,
    from_height: usize,
    to: &CameraCalibration,
    to_width: usize,
    to_height: usize,
) -> Vec<Option<usize>> {
    let mut map = Vec::with_capacity(from_width * from_height);
    for from_row in 0..from_height {
        for from_col in 0..from_width {
            let from_uv = Vector2::new(
                from_col as f32 / (from_width - 1) as f32,
                from_row as f32 / (from_height - 1) as f32,
            );
            let direction = from.direction(from_uv);
            let to_uv = to.uv(direction);
            let to_col = (to_uv.x * (to_width - 1) as f32).round() as i64;
            let to_row = (to_uv.y * (to_height - 1) as f32).round() as i64;

            if to_col < 0 || to_col >= to_width as i64 || to_row < 0 || to_row >= to_height as i64 {
                map.push(None);
            } else {
                map.push(Some(to_col as usize + to_row as usize * to_width));
            }
        }
    }
    map
}

/// Precomputed reprojection tables between a source and destination
/// calibration, one per plane resolution.
pub(crate) struct MappingTables {
    dst_color_width: usize,
    dst_color_height: usize,
    dst_depth_width: usize,
    dst_depth_height: usize,
    y_index_map: Vec<Option<usize>>,
    uv_index_map: Vec<Option<usize>>,
    depth_index_map: Vec<Option<usize>>,
}

impl MappingTables {
    pub(crate) fn new(src: &CameraCalibration, dst: &CameraCalibration) -> Self {
        let dst_color_width = dst.color_width() as usize;
        let dst_color_height = dst.color_height() as usize;
        let dst_depth_width = dst.depth_width() as usize;
        let dst_depth_height = dst.depth_height() as usize;
        let src_color_width = src.color_width() as usize;
        let src_color_height = src.color_height() as usize;

        Self {
            dst_color_width,
            dst_color_height,
            dst_depth_width,
            dst_depth_height,
            y_index_map: index_map(
                dst,
                dst_color_width,
                dst_color_height,
                src,
                src_color_width,
                src_color_height,
            ),
            // The u and v planes are at half resolution.
            uv_index_map: index_map(
                dst,
                dst_color_width / 2,
                dst_color_height / 2,
                src,
                src_color_width / 2,
                src_color_height / 2,
            ),
            depth_index_map: index_map(
                dst,
                dst_depth_width,
                dst_depth_height,
                src,
                src.depth_width() as usize,
                src.depth_height() as usize,
            ),
        }
    }

    pub(crate) fn map_color(&self, frame: &YuvFrame) -> YuvFrame {
        // Missing pixels paint black: y = 0, u = 128, v = 128.
        let mut y_channel = vec![0u8; self.dst_color_width * self.dst_color_height];
        for (i, index) in self.y_index_map.iter().enumerate() {
            if let Some(index) = index {
                y_channel[i] = frame.y_channel[*index];
            }
        }

        let mut u_channel = vec![128u8; y_channel.len() / 4];
        let mut v_channel = vec![128u8; y_channel.len() / 4];
        for (i, index) in self.uv_index_map.iter().enumerate() {
            if let Some(index) = index {
                u_channel[i] = frame.u_channel[*index];
                v_channel[i] = frame.v_channel[*index];
            }
        }

        YuvFrame::new(
            self.dst_color_width,
            self.dst_color_height,
            y_channel,
            u_channel,
            v_channel,
        )
    }

    pub(crate) fn map_depth(&self, frame: &Int32Frame) -> Int32Frame {
        let mut values = vec![0i32; self.dst_depth_width * self.dst_depth_height];
        for (i, index) in self.depth_index_map.iter().enumerate() {
            if let Some(index) = index {
                values[i] = frame.values[*index];
            }
        }
        Int32Frame::new(self.dst_depth_width, self.dst_depth_height, values)
    }
}

/// A reusable reprojection context held in the engine.
///
/// Construction crosses the boundary once to derive the mapping tables from
/// the two calibrations; mapping calls reference them by handle.
pub struct FrameMapper {
    engine: EngineRef,
    handle: Handle,
}

impl FrameMapper {
    pub fn new(
        engine: &EngineRef,
        src: &CameraCalibration,
        dst: &CameraCalibration,
    ) -> Result<Self, Error> {
        let src_handle = src.to_native(engine)?;
        let dst_handle = dst.to_native(engine)?;
        let addr = engine
            .borrow_mut()
            .create_mapper(src_handle.addr(), dst_handle.addr());
        if !addr.is_valid() {
            return Err(Error::Engine("engine rejected mapper construction".into()));
        }
        // src_handle and dst_handle release at scope exit; the engine copied
        // what it needs during create_mapper.
        Ok(Self {
            engine: engine.clone(),
            handle: Handle::owned(engine.clone(), addr),
        })
    }

    /// Reproject a decoded color frame from source optics to destination optics
    pub fn map_color_frame(&self, frame: &YuvFrame) -> Result<YuvFrame, Error> {
        self.engine
            .borrow()
            .map_color_frame(self.handle.addr(), frame)
            .ok_or_else(|| Error::Engine("no mapper object at handle address".into()))
    }

    /// Reproject a decoded depth frame from source optics to destination optics
    pub fn map_depth_frame(&self, frame: &Int32Frame) -> Result<Int32Frame, Error> {
        self.engine
            .borrow()
            .map_depth_frame(self.handle.addr(), frame)
            .ok_or_else(|| Error::Engine("no mapper object at handle address".into()))
    }
}
