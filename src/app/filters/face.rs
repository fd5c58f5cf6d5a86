// SPDX-License-Identifier: GPL-3.0-only

//! Face detection as a filter

use super::Filter;
use crate::app::frame_processor::FaceDetector;
use crate::backends::camera::types::CameraFrame;
use std::sync::Arc;

/// Outlines detected faces on the frame
///
/// Holds a shared handle to the detector so the loaded cascade survives
/// across frames. Frames pass through unannotated while the model is missing.
pub struct FaceDetectionFilter {
    detector: Arc<FaceDetector>,
}

impl FaceDetectionFilter {
    pub fn new(detector: Arc<FaceDetector>) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &Arc<FaceDetector> {
        &self.detector
    }
}

impl Filter for FaceDetectionFilter {
    fn apply(&self, frame: CameraFrame) -> CameraFrame {
        self.detector.annotate(frame)
    }
}
