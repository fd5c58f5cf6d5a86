// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture backend
//!
//! Every source is decoded by a small pipeline ending in an appsink that
//! delivers packed RGB:
//!
//! ```text
//! v4l2src / uridecodebin ! videoconvert ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! The appsink keeps a single buffer and drops older ones, so a slow
//! consumer always sees the newest frame.

use super::{CameraBackend, CameraFrame, CameraHandle, SourceSpec};
use crate::constants::timing;
use crate::errors::CameraError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use tracing::{debug, error, info, warn};

const RGB_CAPS: &str = "video/x-raw,format=RGB";

/// Opens devices, files and URIs through GStreamer
#[derive(Debug, Default, Clone, Copy)]
pub struct GstCameraBackend;

/// Build the launch description for a source
pub fn pipeline_description(spec: &SourceSpec) -> Result<String, CameraError> {
    let head = match spec {
        SourceSpec::Device(index) => format!("v4l2src device=/dev/video{}", index),
        SourceSpec::Uri(uri) => format!("uridecodebin uri=\"{}\"", uri),
        SourceSpec::File(path) => {
            let absolute = std::path::absolute(path).map_err(|e| {
                CameraError::DeviceUnavailable(format!("{}: {}", path.display(), e))
            })?;
            if !absolute.is_file() {
                return Err(CameraError::DeviceUnavailable(format!(
                    "No such file: {}",
                    absolute.display()
                )));
            }
            let uri = gstreamer::glib::filename_to_uri(&absolute, None).map_err(|e| {
                CameraError::DeviceUnavailable(format!("{}: {}", absolute.display(), e))
            })?;
            format!("uridecodebin uri=\"{}\"", uri)
        }
        SourceSpec::TestPattern { .. } => {
            return Err(CameraError::DeviceUnavailable(
                "Test patterns are not handled by GStreamer".into(),
            ));
        }
    };

    Ok(format!(
        "{} ! videoconvert ! {} ! appsink name=sink",
        head, RGB_CAPS
    ))
}

impl CameraBackend for GstCameraBackend {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn CameraHandle>, CameraError> {
        let description = pipeline_description(spec)?;
        info!(source = %spec, pipeline = %description, "Opening camera source");

        gstreamer::init().map_err(|e| {
            CameraError::DeviceUnavailable(format!("GStreamer init failed: {}", e))
        })?;

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| CameraError::DeviceUnavailable(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| CameraError::DeviceUnavailable("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::DeviceUnavailable("Failed to get appsink".into()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| CameraError::DeviceUnavailable("Failed to cast appsink".into()))?;

        // Files play at their own pace; live sources deliver as fast as they can
        appsink.set_property("sync", matches!(spec, SourceSpec::File(_)));
        appsink.set_property("max-buffers", 1u32);
        appsink.set_property("drop", true);

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let reason = take_bus_error(&pipeline).unwrap_or_else(|| e.to_string());
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CameraError::DeviceUnavailable(reason));
        }

        let (result, state, _pending) = pipeline.state(gstreamer::ClockTime::from_seconds(5));
        if result.is_err() {
            let reason = take_bus_error(&pipeline)
                .unwrap_or_else(|| "Pipeline failed to reach Playing state".to_string());
            error!(source = %spec, %reason, "Camera source failed to start");
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(CameraError::DeviceUnavailable(reason));
        }

        debug!(?state, "Camera pipeline running");

        Ok(Box::new(GstCameraHandle {
            pipeline,
            appsink,
            description: spec.to_string(),
            frames: 0,
            closed: false,
        }))
    }
}

/// First error message waiting on the pipeline bus, if any
fn take_bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
    match msg.view() {
        gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
    }
}

/// A running capture pipeline
pub struct GstCameraHandle {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    description: String,
    frames: u64,
    closed: bool,
}

impl GstCameraHandle {
    fn check_bus(&self) -> Result<(), CameraError> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        if let Some(msg) =
            bus.pop_filtered(&[gstreamer::MessageType::Error, gstreamer::MessageType::Eos])
        {
            match msg.view() {
                gstreamer::MessageView::Error(err) => {
                    return Err(CameraError::ReadFailure(err.error().to_string()));
                }
                gstreamer::MessageView::Eos(_) => {
                    return Err(CameraError::ReadFailure("End of stream".into()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl CameraHandle for GstCameraHandle {
    fn read_frame(&mut self) -> Result<CameraFrame, CameraError> {
        if self.closed {
            return Err(CameraError::NotOpen);
        }
        self.check_bus()?;

        let timeout = gstreamer::ClockTime::from_mseconds(timing::READ_TIMEOUT.as_millis() as u64);
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .ok_or_else(|| CameraError::ReadFailure("Timed out waiting for a frame".into()))?;

        let frame = frame_from_sample(&sample)?;
        self.frames += 1;
        if self.frames % 300 == 0 {
            debug!(
                frame = self.frames,
                width = frame.width(),
                height = frame.height(),
                "Frames captured"
            );
        }
        Ok(frame)
    }

    fn nominal_frame_rate(&self) -> Option<f64> {
        let caps = self.appsink.static_pad("sink")?.current_caps()?;
        let info = VideoInfo::from_caps(&caps).ok()?;
        let fps = info.fps();
        if fps.numer() <= 0 || fps.denom() <= 0 {
            return None;
        }
        Some(fps.numer() as f64 / fps.denom() as f64)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!(source = %self.description, "Closing camera source");
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(?e, "Failed to set camera pipeline to Null");
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

impl Drop for GstCameraHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Copy an RGB sample into a tightly packed frame, dropping row padding
fn frame_from_sample(sample: &gstreamer::Sample) -> Result<CameraFrame, CameraError> {
    let caps = sample
        .caps()
        .ok_or_else(|| CameraError::ReadFailure("No caps on sample".into()))?;
    let info = VideoInfo::from_caps(caps)
        .map_err(|e| CameraError::ReadFailure(format!("Failed to get video info: {}", e)))?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| CameraError::ReadFailure("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| CameraError::ReadFailure("Failed to map buffer".into()))?;

    let width = info.width();
    let height = info.height();
    if width == 0 || height == 0 {
        return Err(CameraError::ReadFailure("Empty frame".into()));
    }
    let stride = info.stride()[0] as usize;
    let offset = info.offset()[0];
    let row_bytes = width as usize * 3;
    let data = map.as_slice();

    if stride < row_bytes || data.len() < offset + stride * (height as usize - 1) + row_bytes {
        return Err(CameraError::ReadFailure(format!(
            "Buffer of {} bytes too small for {}x{} RGB",
            data.len(),
            width,
            height
        )));
    }

    let mut rgb = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = offset + row * stride;
        rgb.extend_from_slice(&data[start..start + row_bytes]);
    }

    CameraFrame::from_raw(width, height, rgb)
        .ok_or_else(|| CameraError::ReadFailure("Frame size mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_pipeline() {
        let desc = pipeline_description(&SourceSpec::Device(1)).unwrap();
        assert!(desc.starts_with("v4l2src device=/dev/video1 ! videoconvert"));
        assert!(desc.ends_with("appsink name=sink"));
    }

    #[test]
    fn uri_pipeline_is_quoted() {
        let desc =
            pipeline_description(&SourceSpec::Uri("http://cam.local/video?x=1".into())).unwrap();
        assert!(desc.starts_with("uridecodebin uri=\"http://cam.local/video?x=1\""));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = pipeline_description(&SourceSpec::File("/nonexistent/clip.mp4".into()));
        assert!(matches!(err, Err(CameraError::DeviceUnavailable(_))));
    }
}
