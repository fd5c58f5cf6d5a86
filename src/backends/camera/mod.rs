// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    CaptureLoop      │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │    FrameSource      │  ← One open handle at a time, frame rate policy
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← open(SourceSpec) -> CameraHandle
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌───────────┐
//!  │GStreamer│ │TestPattern│
//!  └─────────┘ └───────────┘
//! ```

pub mod gst_capture;
pub mod source;
pub mod test_pattern;
pub mod types;

pub use gst_capture::GstCameraBackend;
pub use source::{FrameRatePolicy, FrameSource};
pub use test_pattern::TestPatternBackend;
pub use types::*;

use crate::errors::CameraError;

/// An open connection to one capture device or stream
///
/// Dropping a handle releases the device; `close` does the same eagerly and
/// must be safe to call more than once.
pub trait CameraHandle: Send {
    /// Pull the next frame
    ///
    /// Must return within a bounded time. A timeout or a decode problem is
    /// reported as [`CameraError::ReadFailure`] so the caller can skip the tick.
    fn read_frame(&mut self) -> Result<CameraFrame, CameraError>;

    /// Frame rate the device reports, if it reports one
    fn nominal_frame_rate(&self) -> Option<f64>;

    /// Release the underlying device
    fn close(&mut self);

    /// Human readable name for logs and the status bar
    fn description(&self) -> String;
}

/// Factory for camera handles
pub trait CameraBackend: Send {
    /// Open the given source
    ///
    /// Fails with [`CameraError::DeviceUnavailable`] when the source cannot be
    /// opened.
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CameraHandle>, CameraError>;
}

/// Backend used by the application: synthetic sources are generated in
/// process, everything else goes through GStreamer.
#[derive(Debug, Default)]
pub struct SystemBackend {
    gstreamer: GstCameraBackend,
    test_pattern: TestPatternBackend,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraBackend for SystemBackend {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CameraHandle>, CameraError> {
        match spec {
            SourceSpec::TestPattern { .. } => self.test_pattern.open(spec),
            _ => self.gstreamer.open(spec),
        }
    }
}
