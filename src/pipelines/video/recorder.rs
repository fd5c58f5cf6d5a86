// SPDX-License-Identifier: MPL-2.0

//! Recording sink
//!
//! Holds at most one recording session. Frames appended while idle are
//! dropped; frames appended while active must match the dimensions the
//! session was started with.

use super::encoder::{EncoderFactory, EncoderSettings, RecordingFormat, VideoEncoder};
use crate::backends::camera::types::CameraFrame;
use crate::constants::BitratePreset;
use crate::errors::RecordingError;
use crate::storage::next_output_path;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Whether a session is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Active,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Active => write!(f, "Active"),
        }
    }
}

struct RecordingSession {
    path: PathBuf,
    dimensions: (u32, u32),
    fps: f64,
    encoder: Box<dyn VideoEncoder>,
    started_at: Instant,
    frames: u64,
}

pub struct RecordingSink {
    factory: Box<dyn EncoderFactory>,
    bitrate: BitratePreset,
    session: Option<RecordingSession>,
}

impl RecordingSink {
    pub fn new(format: RecordingFormat, bitrate: BitratePreset) -> Self {
        Self::with_factory(format.factory(), bitrate)
    }

    pub fn with_factory(factory: Box<dyn EncoderFactory>, bitrate: BitratePreset) -> Self {
        Self {
            factory,
            bitrate,
            session: None,
        }
    }

    /// Open a new output file and become active
    ///
    /// Already active: the running session is kept and its path returned.
    pub fn start(
        &mut self,
        output_dir: Option<&Path>,
        dimensions: (u32, u32),
        fps: f64,
    ) -> Result<PathBuf, RecordingError> {
        if let Some(session) = &self.session {
            debug!(path = %session.path.display(), "Recording already active");
            return Ok(session.path.clone());
        }

        let (width, height) = dimensions;
        if width == 0 || height == 0 {
            return Err(RecordingError::StartFailed(format!(
                "Invalid frame size {}x{}",
                width, height
            )));
        }

        let path = next_output_path(output_dir, "video", self.factory.extension());
        let settings = EncoderSettings {
            width,
            height,
            fps,
            bitrate: self.bitrate,
        };
        let encoder = self.factory.create(&path, &settings)?;

        info!(path = %path.display(), width, height, fps, "Recording started");
        self.session = Some(RecordingSession {
            path: path.clone(),
            dimensions,
            fps,
            encoder,
            started_at: Instant::now(),
            frames: 0,
        });
        Ok(path)
    }

    /// Write one frame to the active session; a no-op while idle
    pub fn append(&mut self, frame: &CameraFrame) -> Result<(), RecordingError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let actual = frame.dimensions();
        if actual != session.dimensions {
            return Err(RecordingError::FrameShapeMismatch {
                expected: session.dimensions,
                actual,
            });
        }

        session.encoder.push(frame)?;
        session.frames += 1;
        Ok(())
    }

    /// Finalize the active session and become idle
    ///
    /// Returns the finished file, or `None` if nothing was recording.
    pub fn stop(&mut self) -> Result<Option<PathBuf>, RecordingError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };

        let RecordingSession {
            path,
            fps,
            encoder,
            started_at,
            frames,
            ..
        } = session;
        encoder.finish()?;

        info!(
            path = %path.display(),
            frames,
            fps,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Recording stopped"
        );
        Ok(Some(path))
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> RecordingState {
        if self.is_active() {
            RecordingState::Active
        } else {
            RecordingState::Idle
        }
    }

    /// File of the active session
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Frames written to the active session so far
    pub fn frames_written(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.frames)
    }

    /// Frame rate of the active session
    pub fn session_fps(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.fps)
    }
}

impl fmt::Debug for RecordingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSink")
            .field("extension", &self.factory.extension())
            .field("bitrate", &self.bitrate)
            .field("state", &self.state())
            .field("path", &self.current_path())
            .finish()
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to finalize recording on drop");
        }
    }
}
