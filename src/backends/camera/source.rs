// SPDX-License-Identifier: MPL-2.0

//! Frame source: owns the single open camera handle

use super::{CameraBackend, CameraFrame, CameraHandle, SourceSpec};
use crate::constants::frame_rate;
use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the encoder frame rate is derived from what a source reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameRatePolicy {
    /// Extra queries after the first implausible answer
    pub attempts: u32,
    /// Pause between queries
    pub retry_delay_ms: u64,
    /// Rate used when no plausible answer arrives
    pub default_fps: f64,
    /// Anything above this is treated as bogus
    pub max_plausible_fps: f64,
}

impl Default for FrameRatePolicy {
    fn default() -> Self {
        Self {
            attempts: frame_rate::RETRY_ATTEMPTS,
            retry_delay_ms: frame_rate::RETRY_DELAY_MS,
            default_fps: frame_rate::DEFAULT_FPS,
            max_plausible_fps: frame_rate::MAX_PLAUSIBLE_FPS,
        }
    }
}

impl FrameRatePolicy {
    pub fn is_plausible(&self, fps: f64) -> bool {
        fps.is_finite() && fps > 0.0 && fps <= self.max_plausible_fps
    }

    /// Ask `query` until it gives a plausible rate, at most `attempts + 1`
    /// times, then fall back to `default_fps`.
    pub fn resolve(&self, mut query: impl FnMut() -> Option<f64>) -> f64 {
        for attempt in 0..=self.attempts {
            match query() {
                Some(fps) if self.is_plausible(fps) => {
                    debug!(fps, attempt, "Resolved frame rate");
                    return fps;
                }
                reported => {
                    debug!(?reported, attempt, "Implausible frame rate reported");
                }
            }
            if attempt < self.attempts && self.retry_delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.retry_delay_ms));
            }
        }

        warn!(
            fps = self.default_fps,
            "No plausible frame rate reported, using default"
        );
        self.default_fps
    }
}

/// Produces frames from whichever source is currently open
///
/// At most one [`CameraHandle`] is alive at any time; opening a new source
/// releases the previous one first.
pub struct FrameSource {
    backend: Box<dyn CameraBackend>,
    handle: Option<Box<dyn CameraHandle>>,
    spec: Option<SourceSpec>,
}

impl FrameSource {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            handle: None,
            spec: None,
        }
    }

    /// Open `spec`, closing any source that is already open
    ///
    /// On failure no source is left open.
    pub fn open(&mut self, spec: &SourceSpec) -> Result<(), CameraError> {
        self.close();

        let handle = self.backend.open(spec)?;
        info!(source = %handle.description(), "Camera source opened");
        self.handle = Some(handle);
        self.spec = Some(spec.clone());
        Ok(())
    }

    /// Read the next frame
    pub fn read(&mut self) -> Result<CameraFrame, CameraError> {
        match self.handle.as_mut() {
            Some(handle) => handle.read_frame(),
            None => Err(CameraError::NotOpen),
        }
    }

    /// Frame rate to record at, resolved with `policy`
    pub fn nominal_frame_rate(&self, policy: &FrameRatePolicy) -> f64 {
        let handle = self.handle.as_deref();
        policy.resolve(|| handle.and_then(|h| h.nominal_frame_rate()))
    }

    /// Release the current source, if any
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            debug!(source = %handle.description(), "Releasing camera source");
            handle.close();
        }
        self.spec = None;
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// The source currently open
    pub fn spec(&self) -> Option<&SourceSpec> {
        self.spec.as_ref()
    }

    pub fn description(&self) -> Option<String> {
        self.handle.as_ref().map(|h| h.description())
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
