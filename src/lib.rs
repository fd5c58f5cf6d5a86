// SPDX-License-Identifier: MPL-2.0

//! Webcam filters - live camera filtering, photo capture and recording
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture loop, commands, filters and face detection
//! - [`backends`]: Camera source abstraction (GStreamer, test pattern)
//! - [`pipelines`]: Photo and video output pipelines
//! - [`config`]: User configuration handling
//! - [`storage`]: Output file naming
//! - [`terminal`]: Terminal viewer
//!
//! # Example
//!
//! ```ignore
//! let config = webcam_filters::Config::default();
//! let source = webcam_filters::SourceSpec::parse("test:320x240");
//! let mut capture = webcam_filters::app::build_capture_loop(&config, &source)?;
//! capture.select_filter(webcam_filters::app::FilterSelector::Name("Grayscale".into()));
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{CaptureLoop, Command, FilterRegistry, LoopEvent};
pub use backends::camera::types::{CameraFrame, SourceSpec};
pub use config::Config;
pub use constants::BitratePreset;
pub use errors::{AppError, AppResult};
