// SPDX-License-Identifier: MPL-2.0

//! MP4 recording pipeline
//!
//! ```text
//! appsrc (RGB) ! videoconvert ! <encoder> ! <parser> ! mp4mux ! filesink
//! ```
//!
//! Frames are timestamped from their index so the file plays back at the
//! session frame rate regardless of how fast frames arrive.

use super::encoder::{EncoderSettings, VideoEncoder};
use super::encoder_selection::select_video_encoder;
use crate::backends::camera::types::{CameraFrame, Framerate};
use crate::constants::timing;
use crate::errors::RecordingError;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub struct Mp4Encoder {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    path: PathBuf,
    framerate: Framerate,
    frames: u64,
}

fn make(name: &str) -> Result<gst::Element, RecordingError> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| RecordingError::StartFailed(format!("Failed to create {}: {}", name, e)))
}

impl Mp4Encoder {
    pub fn new(path: &Path, settings: &EncoderSettings) -> Result<Self, RecordingError> {
        let selected = select_video_encoder(settings.bitrate, settings.width, settings.height)?;
        let framerate = Framerate::from_f64(settings.fps);

        let pipeline = gst::Pipeline::new();

        let appsrc = gst::ElementFactory::make("appsrc")
            .name("record_src")
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create appsrc: {}", e)))?
            .downcast::<AppSrc>()
            .map_err(|_| RecordingError::StartFailed("Failed to downcast to AppSrc".into()))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", settings.width as i32)
            .field("height", settings.height as i32)
            .field(
                "framerate",
                gst::Fraction::new(framerate.num as i32, framerate.denom as i32),
            )
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);

        let videoconvert = make("videoconvert")?;
        let muxer = make("mp4mux")?;
        let location = path.to_str().ok_or_else(|| {
            RecordingError::StartFailed(format!("Path is not valid UTF-8: {}", path.display()))
        })?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", location)
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create filesink: {}", e)))?;

        let chain = [
            appsrc.upcast_ref(),
            &videoconvert,
            &selected.encoder,
            &selected.parser,
            &muxer,
            &filesink,
        ];
        pipeline
            .add_many(chain)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many(chain)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to link elements: {}", e)))?;

        start_pipeline(&pipeline)?;

        info!(
            path = %path.display(),
            encoder = selected.element_name,
            width = settings.width,
            height = settings.height,
            framerate = %framerate,
            "MP4 recording started"
        );

        Ok(Self {
            pipeline,
            appsrc,
            path: path.to_path_buf(),
            framerate,
            frames: 0,
        })
    }

    fn timestamp(&self, index: u64) -> gst::ClockTime {
        let nanos = index as u128 * 1_000_000_000 * self.framerate.denom as u128
            / self.framerate.num.max(1) as u128;
        gst::ClockTime::from_nseconds(nanos as u64)
    }
}

impl VideoEncoder for Mp4Encoder {
    fn push(&mut self, frame: &CameraFrame) -> Result<(), RecordingError> {
        let data = frame.as_raw();
        let mut buffer = gst::Buffer::with_size(data.len())
            .map_err(|e| RecordingError::WriteFailure(format!("Failed to create buffer: {}", e)))?;
        {
            let buffer_ref = buffer.get_mut().ok_or_else(|| {
                RecordingError::WriteFailure("Failed to get mutable buffer reference".into())
            })?;
            let pts = self.timestamp(self.frames);
            buffer_ref.set_pts(pts);
            buffer_ref.set_duration(self.timestamp(self.frames + 1) - pts);
            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| RecordingError::WriteFailure(format!("Failed to map buffer: {}", e)))?;
            map.copy_from_slice(data);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RecordingError::WriteFailure(format!("Failed to push frame: {:?}", e)))?;

        self.frames += 1;
        if self.frames % 300 == 0 {
            debug!(frames = self.frames, "Recording frames pushed");
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RecordingError> {
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(?e, "Failed to send EOS to recording pipeline");
        }

        let result = match self.pipeline.bus() {
            Some(bus) => wait_for_eos(
                &bus,
                gst::ClockTime::from_mseconds(timing::FINALIZE_TIMEOUT.as_millis() as u64),
            ),
            None => Err(RecordingError::WriteFailure(
                "Recording pipeline has no bus".into(),
            )),
        };

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| RecordingError::WriteFailure(format!("Failed to stop pipeline: {}", e)))?;

        if result.is_ok() {
            info!(path = %self.path.display(), frames = self.frames, "Recording saved");
        }
        result
    }
}

/// Move the pipeline to `Playing`, leaving it in `Null` on any failure
fn start_pipeline(pipeline: &gst::Pipeline) -> Result<(), RecordingError> {
    if let Err(e) = pipeline.set_state(gst::State::Playing) {
        let _ = pipeline.set_state(gst::State::Null);
        return Err(RecordingError::StartFailed(e.to_string()));
    }

    if let Some(bus) = pipeline.bus()
        && let Some(msg) = bus.timed_pop_filtered(
            gst::ClockTime::from_mseconds(100),
            &[gst::MessageType::Error],
        )
        && let gst::MessageView::Error(err) = msg.view()
    {
        error!(
            error = %err.error(),
            debug = ?err.debug(),
            source = ?err.src().map(|s| s.name()),
            "GStreamer error during recording start"
        );
        let _ = pipeline.set_state(gst::State::Null);
        return Err(RecordingError::StartFailed(err.error().to_string()));
    }
    Ok(())
}

/// Block until the muxer has written its trailer.
///
/// A missing EOS within `timeout` means the file was never finalized.
fn wait_for_eos(bus: &gst::Bus, timeout: gst::ClockTime) -> Result<(), RecordingError> {
    match bus.timed_pop_filtered(timeout, &[gst::MessageType::Eos, gst::MessageType::Error]) {
        Some(msg) => match msg.view() {
            gst::MessageView::Error(err) => {
                error!(error = %err.error(), debug = ?err.debug(), "Recording finalize failed");
                Err(RecordingError::WriteFailure(err.error().to_string()))
            }
            _ => Ok(()),
        },
        None => {
            warn!(?timeout, "Timed out waiting for recording EOS");
            Err(RecordingError::WriteFailure(format!(
                "Recording was not finalized within {}",
                timeout
            )))
        }
    }
}

impl Drop for Mp4Encoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_eos_is_a_write_failure() {
        gst::init().unwrap();
        let bus = gst::Bus::new();
        let result = wait_for_eos(&bus, gst::ClockTime::ZERO);
        assert!(matches!(result, Err(RecordingError::WriteFailure(_))));
    }

    #[test]
    fn eos_on_bus_finishes_cleanly() {
        gst::init().unwrap();
        let bus = gst::Bus::new();
        bus.post(gst::message::Eos::new()).unwrap();
        assert!(wait_for_eos(&bus, gst::ClockTime::ZERO).is_ok());
    }

    #[test]
    fn failed_start_leaves_pipeline_stopped() {
        gst::init().unwrap();
        let pipeline = gst::parse::launch(
            "fakesrc num-buffers=1 ! filesink location=/nonexistent-dir/webcam-filters/out.mp4",
        )
        .unwrap()
        .downcast::<gst::Pipeline>()
        .unwrap();

        let result = start_pipeline(&pipeline);
        assert!(matches!(result, Err(RecordingError::StartFailed(_))));
        assert_eq!(pipeline.current_state(), gst::State::Null);
    }
}
