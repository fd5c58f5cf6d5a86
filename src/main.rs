// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use webcam_filters::{Config, SourceSpec};

mod cli;

#[derive(Parser)]
#[command(name = "webcam-filters")]
#[command(about = "Live webcam filters with photo capture and recording")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Configuration file (default: <config dir>/webcam-filters/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (renders the filtered feed to the terminal)
    Terminal {
        /// Device index, URI, video file or test:WxH
        #[arg(short, long)]
        source: Option<String>,
    },

    /// List filter names in selection order
    Filters,

    /// Take a photo
    Photo {
        /// Device index, URI, video file or test:WxH
        #[arg(short, long)]
        source: Option<String>,

        /// Filter applied before saving
        #[arg(short, long, default_value = "None")]
        filter: String,

        /// Output directory or file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Video {
        /// Device index, URI, video file or test:WxH
        #[arg(short, long)]
        source: Option<String>,

        /// Filter applied to every recorded frame
        #[arg(short, long, default_value = "None")]
        filter: String,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Append-mode log file, creating its directory
fn open_log(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok()?;
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Set RUST_LOG to control the level, e.g. `RUST_LOG=webcam_filters=debug`
///
/// The terminal viewer owns the screen, so its logs go to
/// [`Config::log_path`]. Without a writable log file they are dropped.
fn init_logging(terminal: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true);

    if !terminal {
        builder.with_writer(std::io::stderr).init();
        return;
    }
    if let Some(file) = Config::log_path().and_then(|path| open_log(&path)) {
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(matches!(cli.command, None | Some(Commands::Terminal { .. })));

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let source_spec =
        |source: Option<String>| SourceSpec::parse(source.as_deref().unwrap_or(&config.source));

    match cli.command {
        None => webcam_filters::terminal::run(&config, &source_spec(None)),
        Some(Commands::Terminal { source }) => {
            webcam_filters::terminal::run(&config, &source_spec(source))
        }
        Some(Commands::Filters) => cli::list_filters(&config),
        Some(Commands::Photo {
            source,
            filter,
            output,
        }) => cli::take_photo(&config, &source_spec(source), &filter, output),
        Some(Commands::Video {
            source,
            filter,
            duration,
            output,
        }) => cli::record_video(&config, &source_spec(source), &filter, duration, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_with_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("webcam-filters.log");
        assert!(open_log(&path).is_some());
        assert!(path.is_file());
    }
}
