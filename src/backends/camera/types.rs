// SPDX-License-Identifier: MPL-2.0

//! Shared types for camera backends

use image::{GrayImage, Luma, RgbImage};
use std::convert::Infallible;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

/// Frame rate as a fraction, as reported in GStreamer caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from a floating point value, keeping three decimals
    pub fn from_f64(fps: f64) -> Self {
        let rounded = (fps * 1000.0).round();
        if rounded.fract() == 0.0 && rounded % 1000.0 == 0.0 {
            Self::new((rounded / 1000.0) as u32, 1)
        } else {
            Self::new(rounded as u32, 1000)
        }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }
}

impl fmt::Display for Framerate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{:.2}", self.as_f64())
        }
    }
}

/// A single decoded camera frame
///
/// Always three 8-bit channels in RGB order. Filters consume a frame and
/// produce a new one of the same dimensions.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub image: RgbImage,
    /// When the frame was pulled from the source
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Number of color channels in every frame
    pub const CHANNELS: u8 = 3;

    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    /// Build a frame from tightly packed RGB bytes
    ///
    /// Returns `None` when `data` is not exactly `width * height * 3` bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(Self::new)
    }

    /// Frame filled with a single color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn channels(&self) -> u8 {
        Self::CHANNELS
    }

    /// Raw RGB bytes, row-major, no padding
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// BT.601 luma, `Y = 0.299 R + 0.587 G + 0.114 B` in 14-bit fixed point
    pub fn luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let px = self.image.get_pixel(x, y);
            let y = px[0] as u32 * 4899 + px[1] as u32 * 9617 + px[2] as u32 * 1868;
            Luma([((y + (1 << 13)) >> 14) as u8])
        })
    }

    /// Replace the pixels while keeping the capture timestamp
    pub fn with_image(&self, image: RgbImage) -> Self {
        Self {
            image,
            captured_at: self.captured_at,
        }
    }
}

/// Where frames come from
///
/// Parsed from user text: all digits select a local device by index,
/// anything with a scheme is a URI, `test` or `test:WxH` selects the
/// synthetic pattern, and everything else is a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Local capture device, `/dev/video<N>` on Linux
    Device(u32),
    /// Network stream or any URI GStreamer can decode
    Uri(String),
    /// Local video file
    File(PathBuf),
    /// Synthetic moving pattern
    TestPattern { width: u32, height: u32 },
}

impl SourceSpec {
    /// Default size of the synthetic pattern
    pub const TEST_PATTERN_SIZE: (u32, u32) = (640, 480);

    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if !text.is_empty()
            && text.chars().all(|c| c.is_ascii_digit())
            && let Ok(index) = text.parse::<u32>()
        {
            return SourceSpec::Device(index);
        }

        if let Some(rest) = text.strip_prefix("test") {
            let (width, height) = Self::TEST_PATTERN_SIZE;
            if rest.is_empty() || rest == ":" {
                return SourceSpec::TestPattern { width, height };
            }
            if let Some(size) = rest.strip_prefix(':')
                && let Some((w, h)) = size.split_once('x')
                && let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>())
                && w > 0
                && h > 0
            {
                return SourceSpec::TestPattern {
                    width: w,
                    height: h,
                };
            }
        }

        if text.contains("://") {
            return SourceSpec::Uri(text.to_string());
        }

        SourceSpec::File(PathBuf::from(text))
    }
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec::Device(0)
    }
}

impl FromStr for SourceSpec {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SourceSpec::parse(s))
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Device(index) => write!(f, "{}", index),
            SourceSpec::Uri(uri) => write!(f, "{}", uri),
            SourceSpec::File(path) => write!(f, "{}", path.display()),
            SourceSpec::TestPattern { width, height } => write!(f, "test:{}x{}", width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_select_a_device() {
        assert_eq!(SourceSpec::parse("0"), SourceSpec::Device(0));
        assert_eq!(SourceSpec::parse(" 2 "), SourceSpec::Device(2));
    }

    #[test]
    fn urls_and_paths() {
        assert_eq!(
            SourceSpec::parse("rtsp://10.0.0.2/stream"),
            SourceSpec::Uri("rtsp://10.0.0.2/stream".into())
        );
        assert_eq!(
            SourceSpec::parse("clip.mp4"),
            SourceSpec::File(PathBuf::from("clip.mp4"))
        );
    }

    #[test]
    fn test_pattern_sizes() {
        assert_eq!(
            SourceSpec::parse("test"),
            SourceSpec::TestPattern {
                width: 640,
                height: 480
            }
        );
        assert_eq!(
            SourceSpec::parse("test:64x48"),
            SourceSpec::TestPattern {
                width: 64,
                height: 48
            }
        );
        // Malformed size falls through to a file name
        assert_eq!(
            SourceSpec::parse("test:0x48"),
            SourceSpec::File(PathBuf::from("test:0x48"))
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        for text in ["3", "http://cam.local/mjpg", "test:32x16"] {
            assert_eq!(SourceSpec::parse(text).to_string(), text);
        }
    }

    #[test]
    fn framerate_from_f64() {
        assert_eq!(Framerate::from_f64(30.0), Framerate::new(30, 1));
        assert_eq!(Framerate::from_f64(29.97), Framerate::new(29970, 1000));
        assert!((Framerate::new(30000, 1001).as_f64() - 29.97).abs() < 0.01);
    }

    #[test]
    fn frame_shape() {
        let frame = CameraFrame::solid(4, 2, [1, 2, 3]);
        assert_eq!(frame.dimensions(), (4, 2));
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.as_raw().len(), 24);
        assert!(CameraFrame::from_raw(4, 2, vec![0; 23]).is_none());
    }

    #[test]
    fn luma_uses_bt601_weights() {
        let luma = |rgb| CameraFrame::solid(1, 1, rgb).luma().get_pixel(0, 0)[0];
        assert_eq!(luma([255, 0, 0]), 76);
        assert_eq!(luma([0, 255, 0]), 150);
        assert_eq!(luma([0, 0, 255]), 29);
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0]), 0);
    }
}
