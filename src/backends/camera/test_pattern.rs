// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera source
//!
//! Produces a deterministic moving gradient so the pipeline can run without
//! capture hardware.

use super::{CameraBackend, CameraFrame, CameraHandle, SourceSpec};
use crate::errors::CameraError;
use image::RgbImage;
use tracing::debug;

/// Rate reported by synthetic sources
pub const TEST_PATTERN_FPS: f64 = 30.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct TestPatternBackend;

impl CameraBackend for TestPatternBackend {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CameraHandle>, CameraError> {
        match spec {
            SourceSpec::TestPattern { width, height } => {
                debug!(width, height, "Opening test pattern source");
                Ok(Box::new(TestPatternHandle::new(*width, *height)))
            }
            other => Err(CameraError::DeviceUnavailable(format!(
                "{} is not a test pattern source",
                other
            ))),
        }
    }
}

/// Handle producing pattern frames
#[derive(Debug)]
pub struct TestPatternHandle {
    width: u32,
    height: u32,
    frame_index: u32,
    open: bool,
}

impl TestPatternHandle {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
            open: true,
        }
    }
}

/// Pattern frame number `index` of the given size
pub fn pattern_frame(width: u32, height: u32, index: u32) -> CameraFrame {
    let shift = index.wrapping_mul(4);
    let image = RgbImage::from_fn(width, height, |x, y| {
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        let b = (x.wrapping_add(y).wrapping_add(shift) % 256) as u8;
        image::Rgb([r, g, b])
    });
    CameraFrame::new(image)
}

impl CameraHandle for TestPatternHandle {
    fn read_frame(&mut self) -> Result<CameraFrame, CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        let frame = pattern_frame(self.width, self.height, self.frame_index);
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(frame)
    }

    fn nominal_frame_rate(&self) -> Option<f64> {
        Some(TEST_PATTERN_FPS)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn description(&self) -> String {
        format!("Test pattern {}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_have_requested_size_and_move() {
        let backend = TestPatternBackend;
        let mut handle = backend
            .open(&SourceSpec::TestPattern {
                width: 16,
                height: 8,
            })
            .unwrap();

        let first = handle.read_frame().unwrap();
        let second = handle.read_frame().unwrap();
        assert_eq!(first.dimensions(), (16, 8));
        assert_ne!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn closed_handle_stops_producing() {
        let mut handle = TestPatternHandle::new(4, 4);
        handle.close();
        assert!(matches!(handle.read_frame(), Err(CameraError::NotOpen)));
    }

    #[test]
    fn rejects_other_sources() {
        assert!(TestPatternBackend.open(&SourceSpec::Device(0)).is_err());
    }
}
