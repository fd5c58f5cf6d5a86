// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video encoder bitrate presets
///
/// These presets define the target bitrate for MP4 encoding based on resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// Get bitrate in kbps for a given resolution
    ///
    /// - SD (up to 640 wide): Low=1, Medium=2, High=4 Mbps
    /// - HD (up to 1280 wide): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD and above: Low=4, Medium=8, High=16 Mbps
    pub fn bitrate_kbps(&self, width: u32, _height: u32) -> u32 {
        let tier = if width <= 640 {
            0
        } else if width <= 1280 {
            1
        } else {
            2
        };

        match (tier, self) {
            (0, BitratePreset::Low) => 1_000,
            (0, BitratePreset::Medium) => 2_000,
            (0, BitratePreset::High) => 4_000,
            (1, BitratePreset::Low) => 2_500,
            (1, BitratePreset::Medium) => 5_000,
            (1, BitratePreset::High) => 10_000,
            (_, BitratePreset::Low) => 4_000,
            (_, BitratePreset::Medium) => 8_000,
            (_, BitratePreset::High) => 16_000,
        }
    }
}

/// Frame rate handling for recording sessions
pub mod frame_rate {
    /// Used when the source never reports a plausible rate
    pub const DEFAULT_FPS: f64 = 30.0;
    /// Reported rates above this are treated as bogus
    pub const MAX_PLAUSIBLE_FPS: f64 = 1000.0;
    /// How many times the source is asked again before falling back
    pub const RETRY_ATTEMPTS: u32 = 3;
    /// Pause between frame rate queries
    pub const RETRY_DELAY_MS: u64 = 100;
}

/// Parameters of the built-in filters
pub mod filter_params {
    /// Canny hysteresis thresholds
    pub const CANNY_LOW: f32 = 30.0;
    pub const CANNY_HIGH: f32 = 70.0;
    /// Luma values above this become white
    pub const BINARY_THRESHOLD: u8 = 128;
    /// Side length of the smoothing kernels
    pub const KERNEL_SIZE: u32 = 7;
    /// Sigma OpenCV derives for a 7-tap kernel when none is given
    pub const GAUSSIAN_SIGMA: f32 = 1.4;
}

/// Face detection parameters
pub mod detection {
    /// Window growth per scale step
    pub const SCALE_FACTOR: f64 = 1.1;
    /// Overlapping hits needed before a face is reported
    pub const MIN_NEIGHBORS: usize = 5;
    /// Smallest face reported, in pixels
    pub const MIN_SIZE: (u32, u32) = (30, 30);
    /// Relative distance under which two hits are treated as the same face
    pub const GROUP_EPS: f64 = 0.2;
    /// Outline color of detection boxes
    pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
    /// Outline width of detection boxes, in pixels
    pub const BOX_THICKNESS: u32 = 2;
    /// Classifier location relative to the install directory
    pub const MODEL_RELATIVE_PATH: &str = "models/haarcascade_frontalface_default.xml";
}

/// Timing of the capture loop
pub mod timing {
    use super::Duration;

    /// Longest a single frame read may block
    pub const READ_TIMEOUT: Duration = Duration::from_millis(500);
    /// Consecutive failed reads after which the loop gives up
    pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 50;
    /// Longest wait for the muxer to finish writing after end-of-stream
    pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Photo encoding
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Application name used for the config directory
pub const APP_NAME: &str = "webcam-filters";
