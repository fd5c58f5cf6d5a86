// SPDX-License-Identifier: MPL-2.0

//! Frame processing application core
//!
//! # Architecture
//!
//! - `capture_loop`: The tick loop tying source, filters and outputs together
//! - `commands`: User commands and the key bindings that produce them
//! - `filters`: Named per-frame filters
//! - `frame_processor`: Haar cascade face detection
//!
//! # Main Types
//!
//! - `CaptureLoop`: Owns the source, the filter selection and both writers
//! - `Command`: All possible user interactions
//! - `FilterRegistry`: Ordered table of named filters

pub mod capture_loop;
pub mod commands;
pub mod filters;
pub mod frame_processor;

pub use capture_loop::{CaptureLoop, LoopEvent, NullSurface, PresentationSurface, TickOutcome};
pub use commands::{Command, CommandSource, FilterSelector, KeyInput, ScriptedCommands};
pub use filters::{Filter, FilterRegistry};
pub use frame_processor::FaceDetector;

use crate::backends::camera::source::FrameSource;
use crate::backends::camera::types::SourceSpec;
use crate::backends::camera::SystemBackend;
use crate::config::Config;
use crate::errors::AppError;
use std::sync::Arc;
use tracing::info;

/// Face detector using the configured model, or the default location
pub fn face_detector(config: &Config) -> Arc<FaceDetector> {
    let path = config
        .model_path
        .clone()
        .unwrap_or_else(FaceDetector::default_model_path);
    Arc::new(FaceDetector::new(path))
}

/// Capture loop over the system backend with `source` already open
pub fn build_capture_loop(config: &Config, source: &SourceSpec) -> Result<CaptureLoop, AppError> {
    let mut frames = FrameSource::new(Box::new(SystemBackend::new()));
    frames.open(source)?;
    info!(source = %source, "Camera source opened");

    let filters = FilterRegistry::with_builtin(face_detector(config));
    Ok(CaptureLoop::from_config(config, frames, filters))
}
