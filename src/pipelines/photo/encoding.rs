// SPDX-License-Identifier: GPL-3.0-only

//! Photo encoding
//!
//! - JPEG (with quality control)
//! - PNG (lossless)

use crate::constants::DEFAULT_JPEG_QUALITY;
use crate::errors::PhotoError;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Supported encoding formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingFormat {
    /// JPEG format (lossy compression)
    #[default]
    Jpeg,
    /// PNG format (lossless compression)
    Png,
}

impl EncodingFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            EncodingFormat::Jpeg => "jpg",
            EncodingFormat::Png => "png",
        }
    }

    /// Format implied by a file extension, ignoring case
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(EncodingFormat::Jpeg),
            "png" => Some(EncodingFormat::Png),
            _ => None,
        }
    }
}

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodingFormat,
    pub width: u32,
    pub height: u32,
}

/// Photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    format: EncodingFormat,
    jpeg_quality: u8,
}

impl PhotoEncoder {
    pub fn new(format: EncodingFormat, jpeg_quality: u8) -> Self {
        Self {
            format,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn encode(&self, image: &RgbImage) -> Result<EncodedImage, PhotoError> {
        let data = match self.format {
            EncodingFormat::Jpeg => encode_jpeg(image, self.jpeg_quality)?,
            EncodingFormat::Png => encode_png(image)?,
        };

        debug!(size = data.len(), format = ?self.format, "Encoding complete");

        Ok(EncodedImage {
            data,
            format: self.format,
            width: image.width(),
            height: image.height(),
        })
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new(EncodingFormat::Jpeg, DEFAULT_JPEG_QUALITY)
    }
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
    let mut buffer = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);

    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| PhotoError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, PhotoError> {
    let mut buffer = Vec::new();

    image
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageFormat::Png,
        )
        .map_err(|e| PhotoError::EncodingFailed(format!("PNG encoding failed: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_extensions() {
        assert_eq!(EncodingFormat::Jpeg.extension(), "jpg");
        assert_eq!(EncodingFormat::Png.extension(), "png");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(EncodingFormat::from_extension("jpg"), Some(EncodingFormat::Jpeg));
        assert_eq!(EncodingFormat::from_extension("JPEG"), Some(EncodingFormat::Jpeg));
        assert_eq!(EncodingFormat::from_extension("png"), Some(EncodingFormat::Png));
        assert_eq!(EncodingFormat::from_extension("gif"), None);
        assert_eq!(EncodingFormat::from_extension(""), None);
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(PhotoEncoder::new(EncodingFormat::Jpeg, 0).jpeg_quality(), 1);
        assert_eq!(PhotoEncoder::new(EncodingFormat::Jpeg, 200).jpeg_quality(), 100);
        assert_eq!(PhotoEncoder::default().jpeg_quality(), 92);
    }

    #[test]
    fn test_encoded_headers() {
        let image = RgbImage::from_pixel(10, 6, image::Rgb([40, 80, 120]));

        let jpeg = PhotoEncoder::default().encode(&image).unwrap();
        assert_eq!(&jpeg.data[..2], &[0xFF, 0xD8]);
        assert_eq!((jpeg.width, jpeg.height), (10, 6));

        let png = PhotoEncoder::new(EncodingFormat::Png, 92)
            .encode(&image)
            .unwrap();
        assert_eq!(&png.data[1..4], b"PNG");
    }
}
