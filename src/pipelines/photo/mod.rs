// SPDX-License-Identifier: MPL-2.0

//! Photo capture
//!
//! ```text
//! Filtered frame → Encoding (JPEG/PNG) → Timestamped file
//! ```

pub mod encoding;

pub use encoding::{EncodedImage, EncodingFormat, PhotoEncoder};

use crate::backends::camera::types::CameraFrame;
use crate::errors::PhotoError;
use crate::storage::next_output_path;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes single frames as image files
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoWriter {
    encoder: PhotoEncoder,
}

impl PhotoWriter {
    pub fn new(format: EncodingFormat, jpeg_quality: u8) -> Self {
        Self {
            encoder: PhotoEncoder::new(format, jpeg_quality),
        }
    }

    pub fn format(&self) -> EncodingFormat {
        self.encoder.format()
    }

    /// Encode `frame` and write it to a fresh timestamped file in `output_dir`
    pub fn save(&self, frame: &CameraFrame, output_dir: Option<&Path>) -> Result<PathBuf, PhotoError> {
        let encoded = self.encoder.encode(&frame.image)?;
        let path = next_output_path(output_dir, "photo", encoded.format.extension());
        self.write(&encoded, &path)?;

        info!(
            path = %path.display(),
            width = encoded.width,
            height = encoded.height,
            "Photo saved"
        );
        Ok(path)
    }

    fn write(&self, encoded: &EncodedImage, path: &Path) -> Result<(), PhotoError> {
        let mut file = File::create(path).map_err(|e| {
            PhotoError::WriteFailure(format!("Cannot create {}: {}", path.display(), e))
        })?;
        file.write_all(&encoded.data)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let frame = CameraFrame::solid(32, 24, [200, 30, 30]);
        let path = PhotoWriter::default().save(&frame, Some(dir.path())).unwrap();

        assert_eq!(path.extension().unwrap(), "jpg");
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("photo_"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn png_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let frame = CameraFrame::solid(5, 7, [1, 2, 3]);
        let writer = PhotoWriter::new(EncodingFormat::Png, 92);
        let path = writer.save(&frame, Some(dir.path())).unwrap();

        let decoded = image::open(&path).unwrap().into_rgb8();
        assert_eq!(decoded, frame.image);
    }

    #[test]
    fn consecutive_photos_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let frame = CameraFrame::solid(4, 4, [0, 0, 0]);
        let writer = PhotoWriter::default();
        let a = writer.save(&frame, Some(dir.path())).unwrap();
        let b = writer.save(&frame, Some(dir.path())).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn missing_directory_is_a_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = PhotoWriter::default()
            .save(&CameraFrame::solid(4, 4, [0, 0, 0]), Some(&missing))
            .unwrap_err();
        assert!(matches!(err, PhotoError::WriteFailure(_)));
    }
}
