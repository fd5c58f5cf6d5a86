// SPDX-License-Identifier: MPL-2.0

//! Output file naming for photos and recordings

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Timestamp layout used in every output file name
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<prefix>_<timestamp>.<extension>`
pub fn timestamped_filename(prefix: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, at.format(TIMESTAMP_FORMAT), extension)
}

/// Directory outputs go to: the given one, else the working directory
pub fn output_dir(dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    }
}

/// Fresh path for a new output file in `dir`
///
/// Two files started within the same second get `_1`, `_2`, ... suffixes
/// instead of overwriting each other.
pub fn next_output_path(dir: Option<&Path>, prefix: &str, extension: &str) -> PathBuf {
    output_path_at(dir, prefix, extension, Local::now())
}

fn output_path_at(
    dir: Option<&Path>,
    prefix: &str,
    extension: &str,
    at: DateTime<Local>,
) -> PathBuf {
    let dir = output_dir(dir);
    let name = timestamped_filename(prefix, extension, at);
    let stem = name
        .strip_suffix(extension)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(&name);

    let mut candidate = dir.join(&name);
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}_{}.{}", stem, counter, extension));
        counter += 1;
    }

    debug!(path = %candidate.display(), "Allocated output path");
    candidate
}
