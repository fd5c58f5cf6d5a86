// SPDX-License-Identifier: GPL-3.0-only

//! YUV4MPEG2 writer
//!
//! Full-resolution 4:4:4 planes, full range BT.601. Readable by ffmpeg, mpv
//! and GStreamer's `y4mdec` without any codec plugins.

use super::encoder::{EncoderSettings, VideoEncoder};
use crate::backends::camera::types::{CameraFrame, Framerate};
use crate::errors::RecordingError;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FRAME_MARKER: &[u8] = b"FRAME\n";

/// BT.601 full range
#[inline]
fn rgb_to_yuv(r: f32, g: f32, b: f32) -> (u8, u8, u8) {
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.169 * r - 0.331 * g + 0.500 * b + 128.0;
    let v = 0.500 * r - 0.419 * g - 0.081 * b + 128.0;
    (
        y.round().clamp(0.0, 255.0) as u8,
        u.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    )
}

pub struct Y4mEncoder {
    writer: BufWriter<File>,
    path: PathBuf,
    planes: Vec<u8>,
    frames: u64,
}

impl Y4mEncoder {
    pub fn create(path: &Path, settings: &EncoderSettings) -> Result<Self, RecordingError> {
        let file = File::create(path).map_err(|e| {
            RecordingError::StartFailed(format!("Cannot create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);

        let rate = Framerate::from_f64(settings.fps);
        writeln!(
            writer,
            "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C444 XCOLORRANGE=FULL",
            settings.width, settings.height, rate.num, rate.denom
        )?;

        info!(
            path = %path.display(),
            width = settings.width,
            height = settings.height,
            fps = settings.fps,
            "Writing YUV4MPEG2 recording"
        );

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            planes: vec![0; settings.width as usize * settings.height as usize * 3],
            frames: 0,
        })
    }
}

impl VideoEncoder for Y4mEncoder {
    fn push(&mut self, frame: &CameraFrame) -> Result<(), RecordingError> {
        let pixels = frame.as_raw();
        let plane = pixels.len() / 3;
        if self.planes.len() != plane * 3 {
            return Err(RecordingError::WriteFailure(format!(
                "Frame holds {} pixels, expected {}",
                plane,
                self.planes.len() / 3
            )));
        }

        let (y_plane, chroma) = self.planes.split_at_mut(plane);
        let (u_plane, v_plane) = chroma.split_at_mut(plane);
        for (i, px) in pixels.chunks_exact(3).enumerate() {
            let (y, u, v) = rgb_to_yuv(px[0] as f32, px[1] as f32, px[2] as f32);
            y_plane[i] = y;
            u_plane[i] = u;
            v_plane[i] = v;
        }

        self.writer.write_all(FRAME_MARKER)?;
        self.writer.write_all(&self.planes)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RecordingError> {
        let Self {
            writer,
            path,
            frames,
            ..
        } = *self;
        let file = writer
            .into_inner()
            .map_err(|e| RecordingError::WriteFailure(e.error().to_string()))?;
        file.sync_all()?;
        debug!(path = %path.display(), frames, "YUV4MPEG2 recording finalized");
        Ok(())
    }
}

/// Stream parameters and frame count of a YUV4MPEG2 file
#[derive(Debug, Clone, PartialEq)]
pub struct Y4mSummary {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    pub frames: u64,
}

impl Y4mSummary {
    /// Read the header and walk every frame of the file at `path`
    pub fn read(path: &Path) -> Result<Self, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        let mut reader = BufReader::new(file);

        let mut header = String::new();
        reader
            .read_line(&mut header)
            .map_err(|e| e.to_string())?;
        let mut tokens = header.trim_end().split(' ');
        if tokens.next() != Some("YUV4MPEG2") {
            return Err("Not a YUV4MPEG2 file".into());
        }

        let (mut width, mut height, mut framerate) = (0u32, 0u32, Framerate::new(0, 1));
        let mut bytes_per_pixel = 1.5f64;
        for token in tokens {
            let Some((tag, value)) = token.get(..1).zip(token.get(1..)) else {
                continue;
            };
            match tag {
                "W" => width = value.parse().map_err(|_| "Bad width")?,
                "H" => height = value.parse().map_err(|_| "Bad height")?,
                "F" => {
                    let (n, d) = value.split_once(':').ok_or("Bad frame rate")?;
                    framerate = Framerate::new(
                        n.parse().map_err(|_| "Bad frame rate")?,
                        d.parse().map_err(|_| "Bad frame rate")?,
                    );
                }
                "C" if value.starts_with("444") => bytes_per_pixel = 3.0,
                "C" if value.starts_with("422") => bytes_per_pixel = 2.0,
                _ => {}
            }
        }

        let frame_bytes = (width as f64 * height as f64 * bytes_per_pixel) as usize;
        let mut buffer = vec![0u8; frame_bytes];
        let mut frames = 0;
        loop {
            let mut line = Vec::new();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| e.to_string())?;
            if read == 0 {
                break;
            }
            if !line.starts_with(b"FRAME") {
                return Err(format!("Missing FRAME marker before frame {}", frames));
            }
            reader
                .read_exact(&mut buffer)
                .map_err(|e| format!("Truncated frame {}: {}", frames, e))?;
            frames += 1;
        }

        Ok(Self {
            width,
            height,
            framerate,
            frames,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BitratePreset;

    fn settings(width: u32, height: u32) -> EncoderSettings {
        EncoderSettings {
            width,
            height,
            fps: 30.0,
            bitrate: BitratePreset::default(),
        }
    }

    #[test]
    fn header_and_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.y4m");

        let mut encoder: Box<dyn VideoEncoder> =
            Box::new(Y4mEncoder::create(&path, &settings(8, 4)).unwrap());
        for _ in 0..3 {
            encoder.push(&CameraFrame::solid(8, 4, [255, 0, 0])).unwrap();
        }
        encoder.finish().unwrap();

        let summary = Y4mSummary::read(&path).unwrap();
        assert_eq!((summary.width, summary.height), (8, 4));
        assert_eq!(summary.framerate, Framerate::new(30, 1));
        assert_eq!(summary.frames, 3);

        let len = std::fs::metadata(&path).unwrap().len() as usize;
        let header = "YUV4MPEG2 W8 H4 F30:1 Ip A1:1 C444 XCOLORRANGE=FULL\n".len();
        assert_eq!(len, header + 3 * (6 + 8 * 4 * 3));
    }

    #[test]
    fn rejects_wrong_sized_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = Y4mEncoder::create(&dir.path().join("x.y4m"), &settings(8, 4)).unwrap();
        assert!(encoder.push(&CameraFrame::solid(4, 4, [0, 0, 0])).is_err());
    }

    #[test]
    fn bt601_primaries() {
        assert_eq!(rgb_to_yuv(0.0, 0.0, 0.0), (0, 128, 128));
        assert_eq!(rgb_to_yuv(255.0, 255.0, 255.0), (255, 128, 128));
        let (y, _, v) = rgb_to_yuv(255.0, 0.0, 0.0);
        assert_eq!(y, 76);
        assert_eq!(v, 255);
    }
}
