// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::FrameRatePolicy;
use crate::constants::{APP_NAME, BitratePreset, DEFAULT_JPEG_QUALITY, timing};
use crate::errors::ConfigError;
use crate::pipelines::photo::EncodingFormat;
use crate::pipelines::video::RecordingFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "webcam-filters.log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture source opened at startup (device index, URI, file or `test:WxH`)
    pub source: String,
    /// Where photos and recordings go; the working directory when unset
    pub output_dir: Option<PathBuf>,
    /// Face classifier override
    pub model_path: Option<PathBuf>,
    /// Container for recordings
    pub recording_format: RecordingFormat,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
    pub photo_format: EncodingFormat,
    pub jpeg_quality: u8,
    /// How the recording frame rate is resolved
    pub frame_rate: FrameRatePolicy,
    /// Failed reads in a row after which the capture loop stops
    pub max_consecutive_read_failures: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "0".to_string(),
            output_dir: None,
            model_path: None,
            recording_format: RecordingFormat::default(),
            bitrate_preset: BitratePreset::default(), // Default to Medium
            photo_format: EncodingFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            frame_rate: FrameRatePolicy::default(),
            max_consecutive_read_failures: timing::MAX_CONSECUTIVE_READ_FAILURES,
        }
    }
}

impl Config {
    /// `<config dir>/webcam-filters/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// `<cache dir>/webcam-filters/webcam-filters.log`, where the terminal
    /// viewer sends its logs
    pub fn log_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join(APP_NAME).join(LOG_FILE))
    }

    /// Load from `path`; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }
}
