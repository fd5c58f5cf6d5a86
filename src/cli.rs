// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for headless capture
//!
//! This module provides command-line functionality for:
//! - Listing filters
//! - Taking photos
//! - Recording videos

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use webcam_filters::app::{
    CaptureLoop, Command, CommandSource, FilterRegistry, FilterSelector, LoopEvent, NullSurface,
    PresentationSurface, TickOutcome, build_capture_loop, face_detector,
};
use webcam_filters::backends::camera::types::{CameraFrame, SourceSpec};
use webcam_filters::pipelines::photo::EncodingFormat;
use webcam_filters::Config;

/// Frames dropped while the camera settles
const WARMUP: Duration = Duration::from_millis(500);
/// Longest wait for a first frame
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// List the filters in the order the number keys select them
pub fn list_filters(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let registry = FilterRegistry::with_builtin(face_detector(config));
    println!("Available filters:");
    println!();
    for (index, name) in registry.names().enumerate() {
        println!("  [{}] {}", index, name);
    }
    Ok(())
}

fn open(
    config: &Config,
    source: &SourceSpec,
    filter: &str,
    output_dir: Option<PathBuf>,
) -> Result<CaptureLoop, Box<dyn std::error::Error>> {
    println!("Using source: {}", source);
    let mut capture = build_capture_loop(config, source)?.with_output_dir(output_dir);

    if !capture.filters().contains(filter) {
        eprintln!("Unknown filter '{}', frames pass through unchanged", filter);
    }
    capture.select_filter(FilterSelector::Name(filter.to_string()));
    Ok(capture)
}

/// Tick without input until a frame has been presented after `warmup`
fn wait_for_frame(
    capture: &mut CaptureLoop,
    warmup: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut idle = NoInput;
    while start.elapsed() < FIRST_FRAME_TIMEOUT {
        if capture.tick(&mut NullSurface, &mut idle) == TickOutcome::SourceExhausted {
            break;
        }
        match capture.last_frame() {
            Some(frame) if start.elapsed() >= warmup => {
                println!("Capture format: {}x{}", frame.width(), frame.height());
                return Ok(());
            }
            _ => std::thread::sleep(Duration::from_millis(16)),
        }
    }
    Err("Failed to capture frame from camera".into())
}

struct NoInput;

impl CommandSource for NoInput {
    fn poll_command(&mut self) -> Option<Command> {
        None
    }
}

/// Format and final path for a photo written to `path`
///
/// The extension picks the format; a bare name gets the configured one.
fn photo_target(
    path: &Path,
    configured: EncodingFormat,
) -> Result<(EncodingFormat, PathBuf), Box<dyn std::error::Error>> {
    match path.extension().and_then(|e| e.to_str()) {
        None => Ok((configured, path.with_extension(configured.extension()))),
        Some(ext) => match EncodingFormat::from_extension(ext) {
            Some(format) => Ok((format, path.to_path_buf())),
            None => Err(format!(
                "Unsupported photo extension '.{}', use .jpg, .jpeg or .png",
                ext
            )
            .into()),
        },
    }
}

/// Take a photo with the given filter applied
pub fn take_photo(
    config: &Config,
    source: &SourceSpec,
    filter: &str,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();

    // A path that is not an existing directory names the file itself
    let (output_dir, rename_to) = match output {
        Some(path) if path.is_dir() => (Some(path), None),
        Some(path) => {
            let (format, path) = photo_target(&path, config.photo_format)?;
            config.photo_format = format;
            (
                path.parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_path_buf()),
                Some(path),
            )
        }
        None => (config.output_dir.clone(), None),
    };
    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut capture = open(&config, source, filter, output_dir)?;
    println!("Capturing...");
    wait_for_frame(&mut capture, WARMUP)?;

    let saved = capture.capture_photo()?;
    capture.shutdown();

    if let Some(user_path) = rename_to {
        std::fs::rename(&saved, &user_path)?;
        println!("Photo saved: {}", user_path.display());
        return Ok(());
    }

    println!("Photo saved: {}", saved.display());
    Ok(())
}

/// Starts recording on the first tick, quits on timeout or Ctrl+C
struct TimedRecording {
    started: bool,
    deadline: Instant,
    stop_flag: Arc<AtomicBool>,
}

impl CommandSource for TimedRecording {
    fn poll_command(&mut self) -> Option<Command> {
        if !self.started {
            self.started = true;
            return Some(Command::ToggleRecord);
        }
        if self.stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            return Some(Command::Quit);
        }
        if Instant::now() >= self.deadline {
            return Some(Command::Quit);
        }
        None
    }
}

/// Prints progress and outcome of a recording
struct ProgressReporter {
    started_at: Option<Instant>,
    last_second: u64,
    saved: Option<PathBuf>,
    failed: Option<String>,
    stop_flag: Arc<AtomicBool>,
}

impl PresentationSurface for ProgressReporter {
    fn present(&mut self, _frame: &CameraFrame, recording: bool) {
        let Some(started_at) = self.started_at.filter(|_| recording) else {
            return;
        };
        let elapsed = started_at.elapsed().as_secs();
        if elapsed != self.last_second {
            self.last_second = elapsed;
            print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
    }

    fn notify(&mut self, event: &LoopEvent) {
        match event {
            LoopEvent::RecordingStarted(path) => {
                println!("Output: {}", path.display());
                println!();
                println!("Recording... (press Ctrl+C to stop early)");
                self.started_at = Some(Instant::now());
            }
            LoopEvent::RecordingStopped(path) => self.saved = Some(path.clone()),
            LoopEvent::Error(e) => {
                eprintln!();
                eprintln!("{}", e);
                if self.started_at.is_none() {
                    self.failed = Some(e.to_string());
                    self.stop_flag.store(true, Ordering::SeqCst);
                }
            }
            _ => {}
        }
    }
}

/// Record `duration` seconds with the given filter applied
pub fn record_video(
    config: &Config,
    source: &SourceSpec,
    filter: &str,
    duration: u64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = output.or_else(|| config.output_dir.clone());
    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut capture = open(config, source, filter, output_dir)?;
    wait_for_frame(&mut capture, Duration::ZERO)?;
    println!("Duration: {} seconds", duration);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let mut reporter = ProgressReporter {
        started_at: None,
        last_second: 0,
        saved: None,
        failed: None,
        stop_flag: stop_flag.clone(),
    };
    let mut commands = TimedRecording {
        started: false,
        deadline: Instant::now() + Duration::from_secs(duration),
        stop_flag,
    };

    let outcome = capture.run(&mut reporter, &mut commands);
    println!();

    if let Some(reason) = reporter.failed {
        return Err(reason.into());
    }
    match reporter.saved {
        Some(path) => {
            if outcome == TickOutcome::SourceExhausted {
                println!("Source ended before the requested duration");
            }
            println!("Video saved: {}", path.display());
            Ok(())
        }
        None => Err("Recording did not produce a file".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_extension_selects_format() {
        let (format, path) = photo_target(Path::new("shots/me.png"), EncodingFormat::Jpeg).unwrap();
        assert_eq!(format, EncodingFormat::Png);
        assert_eq!(path, PathBuf::from("shots/me.png"));

        let (format, _) = photo_target(Path::new("me.JPEG"), EncodingFormat::Png).unwrap();
        assert_eq!(format, EncodingFormat::Jpeg);
    }

    #[test]
    fn bare_photo_name_uses_configured_format() {
        let (format, path) = photo_target(Path::new("me"), EncodingFormat::Png).unwrap();
        assert_eq!(format, EncodingFormat::Png);
        assert_eq!(path, PathBuf::from("me.png"));
    }

    #[test]
    fn unknown_photo_extension_is_rejected() {
        assert!(photo_target(Path::new("me.gif"), EncodingFormat::Jpeg).is_err());
    }
}
