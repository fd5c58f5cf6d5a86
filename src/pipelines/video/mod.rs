// SPDX-License-Identifier: MPL-2.0

//! Video recording
//!
//! [`RecordingSink`] owns the recording session; the container is written by
//! a [`VideoEncoder`] picked through [`RecordingFormat`]:
//! - MP4 through GStreamer with the best installed software encoder
//! - Uncompressed YUV4MPEG2 written directly

pub mod encoder;
pub mod encoder_selection;
pub mod muxer;
pub mod recorder;
pub mod y4m;

pub use encoder::{EncoderFactory, EncoderSettings, RecordingFormat, VideoEncoder};
pub use recorder::{RecordingSink, RecordingState};
pub use y4m::Y4mSummary;
