// SPDX-License-Identifier: MPL-2.0

//! Encoder selection for the MP4 recording pipeline
//!
//! Software encoders are tried in priority order; the first one GStreamer can
//! instantiate wins. Each is paired with the parser that feeds `mp4mux`.

use crate::constants::BitratePreset;
use crate::errors::RecordingError;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info};

/// Codec produced by a selected encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Mpeg4,
}

impl VideoCodec {
    pub fn parser_name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264parse",
            VideoCodec::Mpeg4 => "mpeg4videoparse",
        }
    }
}

/// Encoders in priority order
pub const ENCODER_CANDIDATES: [(&str, VideoCodec); 3] = [
    ("x264enc", VideoCodec::H264),
    ("openh264enc", VideoCodec::H264),
    ("avenc_mpeg4", VideoCodec::Mpeg4),
];

/// Encoder and parser elements ready to be added to a pipeline
pub struct SelectedVideoEncoder {
    pub encoder: gst::Element,
    pub parser: gst::Element,
    pub element_name: &'static str,
}

/// Select the best available encoder, configured for the given stream
pub fn select_video_encoder(
    preset: BitratePreset,
    width: u32,
    height: u32,
) -> Result<SelectedVideoEncoder, RecordingError> {
    gst::init().map_err(|e| RecordingError::StartFailed(format!("GStreamer init failed: {}", e)))?;

    let bitrate = preset.bitrate_kbps(width, height);

    for (name, codec) in ENCODER_CANDIDATES {
        let Ok(encoder) = gst::ElementFactory::make(name).build() else {
            continue;
        };
        let Ok(parser) = gst::ElementFactory::make(codec.parser_name()).build() else {
            debug!(encoder = name, parser = codec.parser_name(), "Parser missing, skipping encoder");
            continue;
        };

        configure_video_encoder(&encoder, name, bitrate);
        info!(encoder = name, codec = ?codec, bitrate_kbps = bitrate, "Selected video encoder");

        return Ok(SelectedVideoEncoder {
            encoder,
            parser,
            element_name: name,
        });
    }

    Err(RecordingError::EncoderNotAvailable(
        "No video encoder available. Install gst-plugins-ugly (x264enc), gst-plugin-openh264 or gst-libav"
            .to_string(),
    ))
}

/// Apply bitrate and latency settings for the named encoder
fn configure_video_encoder(encoder: &gst::Element, name: &str, bitrate_kbps: u32) {
    let kbps = bitrate_kbps.to_string();
    let bps = (bitrate_kbps * 1000).to_string();
    let settings: &[(&str, &str)] = match name {
        "x264enc" => &[
            ("speed-preset", "veryfast"),
            ("tune", "zerolatency"),
            ("bitrate", kbps.as_str()),
        ],
        "openh264enc" => &[
            ("rate-control", "bitrate"),
            ("bitrate", bps.as_str()),
            ("usage-type", "camera"),
        ],
        "avenc_mpeg4" => &[("bitrate", bps.as_str())],
        _ => &[],
    };

    for &(property, value) in settings {
        // Setting an unknown property aborts, and plugin versions differ
        if encoder.find_property(property).is_some() {
            encoder.set_property_from_str(property, value);
        } else {
            debug!(encoder = name, property, "Encoder lacks property, skipping");
        }
    }
    debug!(encoder = name, bitrate_kbps, "Configured video encoder");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_prefer_h264() {
        assert_eq!(ENCODER_CANDIDATES[0].0, "x264enc");
        assert!(
            ENCODER_CANDIDATES
                .iter()
                .take(2)
                .all(|(_, codec)| *codec == VideoCodec::H264)
        );
    }

    #[test]
    fn parsers_match_codecs() {
        assert_eq!(VideoCodec::H264.parser_name(), "h264parse");
        assert_eq!(VideoCodec::Mpeg4.parser_name(), "mpeg4videoparse");
    }
}
