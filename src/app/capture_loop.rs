// SPDX-License-Identifier: GPL-3.0-only

//! Capture loop
//!
//! One tick reads a frame, runs the selected filter, appends the result to
//! an active recording, presents it and then handles at most one command.
//! Per-tick failures never escape a tick: they are logged and handed to the
//! presentation surface as [`LoopEvent::Error`].

use super::commands::{Command, CommandSource, FilterSelector};
use super::filters::{FilterRegistry, IDENTITY};
use crate::backends::camera::FrameRatePolicy;
use crate::backends::camera::source::FrameSource;
use crate::backends::camera::types::{CameraFrame, SourceSpec};
use crate::config::Config;
use crate::constants::timing;
use crate::errors::{AppError, PhotoError, RecordingError};
use crate::pipelines::photo::PhotoWriter;
use crate::pipelines::video::RecordingSink;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Something the user should hear about
#[derive(Debug, Clone)]
pub enum LoopEvent {
    FilterSelected(String),
    RecordingStarted(PathBuf),
    RecordingStopped(PathBuf),
    PhotoSaved(PathBuf),
    SourceChanged(SourceSpec),
    HelpToggled,
    Error(AppError),
}

impl fmt::Display for LoopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopEvent::FilterSelected(name) => write!(f, "Filter: {}", name),
            LoopEvent::RecordingStarted(path) => write!(f, "Recording to {}", path.display()),
            LoopEvent::RecordingStopped(path) => write!(f, "Saved {}", path.display()),
            LoopEvent::PhotoSaved(path) => write!(f, "Photo saved: {}", path.display()),
            LoopEvent::SourceChanged(spec) => write!(f, "Source: {}", spec),
            LoopEvent::HelpToggled => write!(f, "Help"),
            LoopEvent::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Where filtered frames end up
pub trait PresentationSurface {
    /// Show `frame`; `recording` is true while a session is active
    fn present(&mut self, frame: &CameraFrame, recording: bool);

    fn notify(&mut self, _event: &LoopEvent) {}
}

/// Surface that discards frames, for headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl PresentationSurface for NullSurface {
    fn present(&mut self, _frame: &CameraFrame, _recording: bool) {}
}

/// What the caller should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Quit,
    /// Too many reads in a row failed
    SourceExhausted,
}

pub struct CaptureLoop {
    // Declared before `source` so an implicit drop also finalizes the
    // recording before the device is released.
    recorder: RecordingSink,
    source: FrameSource,
    filters: FilterRegistry,
    selected: String,
    photos: PhotoWriter,
    output_dir: Option<PathBuf>,
    frame_rate: FrameRatePolicy,
    max_read_failures: u32,
    read_failures: u32,
    last_frame: Option<CameraFrame>,
    frames: u64,
}

impl CaptureLoop {
    pub fn new(
        source: FrameSource,
        filters: FilterRegistry,
        recorder: RecordingSink,
        photos: PhotoWriter,
    ) -> Self {
        Self {
            recorder,
            source,
            filters,
            selected: IDENTITY.to_string(),
            photos,
            output_dir: None,
            frame_rate: FrameRatePolicy::default(),
            max_read_failures: timing::MAX_CONSECUTIVE_READ_FAILURES,
            read_failures: 0,
            last_frame: None,
            frames: 0,
        }
    }

    /// Loop wired with the writers and limits from `config`
    pub fn from_config(config: &Config, source: FrameSource, filters: FilterRegistry) -> Self {
        Self::new(
            source,
            filters,
            RecordingSink::new(config.recording_format, config.bitrate_preset),
            PhotoWriter::new(config.photo_format, config.jpeg_quality),
        )
        .with_output_dir(config.output_dir.clone())
        .with_frame_rate_policy(config.frame_rate)
        .with_max_read_failures(config.max_consecutive_read_failures)
    }

    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn with_frame_rate_policy(mut self, policy: FrameRatePolicy) -> Self {
        self.frame_rate = policy;
        self
    }

    pub fn with_max_read_failures(mut self, max: u32) -> Self {
        self.max_read_failures = max.max(1);
        self
    }

    pub fn selected_filter(&self) -> &str {
        &self.selected
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_active()
    }

    pub fn recorder(&self) -> &RecordingSink {
        &self.recorder
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    /// The filtered frame presented last
    pub fn last_frame(&self) -> Option<&CameraFrame> {
        self.last_frame.as_ref()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Switch filters; returns the new selection
    ///
    /// An index past the end of the registry changes nothing and returns
    /// `None`. Names are taken as given, unknown ones act as the identity.
    pub fn select_filter(&mut self, selector: FilterSelector) -> Option<&str> {
        let name = match selector {
            FilterSelector::Index(index) => self.filters.name_at(index)?.to_string(),
            FilterSelector::Name(name) => name,
            FilterSelector::Next => {
                let next = self
                    .filters
                    .index_of(&self.selected)
                    .map_or(0, |i| (i + 1) % self.filters.len().max(1));
                self.filters.name_at(next).unwrap_or(IDENTITY).to_string()
            }
        };

        info!(filter = %name, "Filter selected");
        self.selected = name;
        Some(&self.selected)
    }

    /// Open `spec` in place of the current source
    ///
    /// An active recording is finalized first. On failure no source is open
    /// and the loop keeps ticking until another source is opened.
    pub fn open_source(&mut self, spec: &SourceSpec) -> Result<(), AppError> {
        if self.recorder.is_active()
            && let Err(e) = self.recorder.stop()
        {
            warn!(error = %e, "Failed to finalize recording before source change");
        }

        self.last_frame = None;
        self.read_failures = 0;
        self.source.open(spec)?;
        Ok(())
    }

    /// Start a session sized like the frame on screen
    pub fn start_recording(&mut self) -> Result<PathBuf, RecordingError> {
        if let Some(path) = self.recorder.current_path() {
            return Ok(path.to_path_buf());
        }
        let dimensions = self
            .last_frame
            .as_ref()
            .map(CameraFrame::dimensions)
            .ok_or_else(|| RecordingError::StartFailed("No frame to size the recording".into()))?;

        let fps = self.source.nominal_frame_rate(&self.frame_rate);
        let dir = self.output_dir.clone();
        self.recorder.start(dir.as_deref(), dimensions, fps)
    }

    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>, RecordingError> {
        self.recorder.stop()
    }

    /// Save the filtered frame currently on screen
    pub fn capture_photo(&self) -> Result<PathBuf, PhotoError> {
        let frame = self.last_frame.as_ref().ok_or(PhotoError::NoFrameAvailable)?;
        self.photos.save(frame, self.output_dir())
    }

    /// Run one iteration
    pub fn tick(
        &mut self,
        surface: &mut dyn PresentationSurface,
        commands: &mut dyn CommandSource,
    ) -> TickOutcome {
        if self.source.is_open() {
            match self.source.read() {
                Ok(frame) => self.process(frame, surface),
                Err(e) => {
                    self.read_failures += 1;
                    if self.read_failures == 1 {
                        warn!(error = %e, "Frame read failed");
                        surface.notify(&LoopEvent::Error(e.clone().into()));
                    } else if self.read_failures % 10 == 0 {
                        debug!(failures = self.read_failures, "Frame reads still failing");
                    }
                    if self.read_failures >= self.max_read_failures {
                        error!(
                            failures = self.read_failures,
                            error = %e,
                            "Giving up on camera source"
                        );
                        return TickOutcome::SourceExhausted;
                    }
                }
            }
        }

        match commands.poll_command() {
            Some(command) => self.dispatch(command, surface),
            None => TickOutcome::Continue,
        }
    }

    fn process(&mut self, frame: CameraFrame, surface: &mut dyn PresentationSurface) {
        self.read_failures = 0;
        let filtered = self.filters.apply(frame, &self.selected);

        if let Err(e) = self.recorder.append(&filtered) {
            warn!(error = %e, "Dropping frame from recording");
            surface.notify(&LoopEvent::Error(e.into()));
        }

        surface.present(&filtered, self.recorder.is_active());
        self.last_frame = Some(filtered);

        self.frames += 1;
        if self.frames % 300 == 0 {
            debug!(
                frame = self.frames,
                filter = %self.selected,
                recording = self.recorder.is_active(),
                "Capture loop running"
            );
        }
    }

    /// Act on one command
    pub fn dispatch(
        &mut self,
        command: Command,
        surface: &mut dyn PresentationSurface,
    ) -> TickOutcome {
        let event = match command {
            Command::Quit => return TickOutcome::Quit,
            Command::SelectFilter(selector) => self
                .select_filter(selector)
                .map(|name| LoopEvent::FilterSelected(name.to_string())),
            Command::ToggleRecord => Some(self.toggle_recording()),
            Command::CapturePhoto => Some(match self.capture_photo() {
                Ok(path) => LoopEvent::PhotoSaved(path),
                Err(e) => LoopEvent::Error(e.into()),
            }),
            Command::ChangeSource(spec) => {
                if self.recorder.is_active()
                    && let Some(path) = self.report_stop(surface)
                {
                    surface.notify(&LoopEvent::RecordingStopped(path));
                }
                Some(match self.open_source(&spec) {
                    Ok(()) => LoopEvent::SourceChanged(spec),
                    Err(e) => LoopEvent::Error(e),
                })
            }
            Command::ToggleHelp => Some(LoopEvent::HelpToggled),
        };

        if let Some(event) = event {
            if let LoopEvent::Error(e) = &event {
                warn!(error = %e, "Command failed");
            }
            surface.notify(&event);
        }
        TickOutcome::Continue
    }

    fn toggle_recording(&mut self) -> LoopEvent {
        if self.recorder.is_active() {
            match self.recorder.stop() {
                Ok(Some(path)) => LoopEvent::RecordingStopped(path),
                Ok(None) => LoopEvent::Error(AppError::Other("Not recording".into())),
                Err(e) => LoopEvent::Error(e.into()),
            }
        } else {
            match self.start_recording() {
                Ok(path) => LoopEvent::RecordingStarted(path),
                Err(e) => LoopEvent::Error(e.into()),
            }
        }
    }

    fn report_stop(&mut self, surface: &mut dyn PresentationSurface) -> Option<PathBuf> {
        match self.recorder.stop() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Failed to finalize recording");
                surface.notify(&LoopEvent::Error(e.into()));
                None
            }
        }
    }

    /// Tick until quit or until the source gives out, then shut down
    pub fn run(
        &mut self,
        surface: &mut dyn PresentationSurface,
        commands: &mut dyn CommandSource,
    ) -> TickOutcome {
        info!(
            source = ?self.source.description(),
            filter = %self.selected,
            "Capture loop started"
        );

        let outcome = loop {
            match self.tick(surface, commands) {
                TickOutcome::Continue => {}
                outcome => break outcome,
            }
        };

        if let Some(path) = self.report_stop(surface) {
            surface.notify(&LoopEvent::RecordingStopped(path));
        }
        self.shutdown();
        info!(?outcome, frames = self.frames, "Capture loop finished");
        outcome
    }

    /// Finalize any recording, then release the source
    pub fn shutdown(&mut self) {
        if let Err(e) = self.recorder.stop() {
            error!(error = %e, "Failed to finalize recording on shutdown");
        }
        self.source.close();
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
