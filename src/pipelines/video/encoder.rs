// SPDX-License-Identifier: GPL-3.0-only

//! Video encoder abstraction
//!
//! A recording session pushes RGB frames into a [`VideoEncoder`] and calls
//! [`VideoEncoder::finish`] exactly once. [`EncoderFactory`] creates encoders
//! for a given output format.

use super::muxer::Mp4Encoder;
use super::y4m::Y4mEncoder;
use crate::backends::camera::types::CameraFrame;
use crate::constants::BitratePreset;
use crate::errors::RecordingError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed parameters of one recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub bitrate: BitratePreset,
}

/// Sink for the frames of a single output file
pub trait VideoEncoder: Send {
    /// Encode one frame; its dimensions have already been checked
    fn push(&mut self, frame: &CameraFrame) -> Result<(), RecordingError>;

    /// Flush everything and close the file
    fn finish(self: Box<Self>) -> Result<(), RecordingError>;
}

/// Creates encoders for one output format
pub trait EncoderFactory: Send {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn create(
        &self,
        path: &Path,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, RecordingError>;
}

/// Container written by the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordingFormat {
    /// H.264 (or MPEG-4 Part 2) in MP4 through GStreamer
    #[default]
    Mp4,
    /// Uncompressed YUV4MPEG2
    Y4m,
}

impl RecordingFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RecordingFormat::Mp4 => "mp4",
            RecordingFormat::Y4m => "y4m",
        }
    }

    pub fn factory(&self) -> Box<dyn EncoderFactory> {
        match self {
            RecordingFormat::Mp4 => Box::new(Mp4EncoderFactory),
            RecordingFormat::Y4m => Box::new(Y4mEncoderFactory),
        }
    }
}

/// Produces [`Mp4Encoder`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct Mp4EncoderFactory;

impl EncoderFactory for Mp4EncoderFactory {
    fn extension(&self) -> &'static str {
        RecordingFormat::Mp4.extension()
    }

    fn create(
        &self,
        path: &Path,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, RecordingError> {
        Ok(Box::new(Mp4Encoder::new(path, settings)?))
    }
}

/// Produces [`Y4mEncoder`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct Y4mEncoderFactory;

impl EncoderFactory for Y4mEncoderFactory {
    fn extension(&self) -> &'static str {
        RecordingFormat::Y4m.extension()
    }

    fn create(
        &self,
        path: &Path,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn VideoEncoder>, RecordingError> {
        Ok(Box::new(Y4mEncoder::create(path, settings)?))
    }
}
