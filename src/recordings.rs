//! Recordings on disk: naming, listing and display.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

pub const RECORDING_EXTENSION: &str = "mp4";

/// `{dir}/{unix_secs}.mp4`
pub fn recording_path(dir: &Path, unix_secs: i64) -> PathBuf {
    dir.join(format!("{unix_secs}.{RECORDING_EXTENSION}"))
}

/// File names in `dir`, sorted by name. An unreadable directory lists as empty.
///
/// Recording names are fixed-width unix seconds for the foreseeable future, so name
/// order is chronological order.
pub fn list_recordings(dir: &Path, descending: bool) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
        .collect();

    names.sort();
    if descending {
        names.reverse();
    }
    names
}

/// Render a recording name as the local time it started, e.g. ` 3 Mar 2024 14:05:09`.
/// Names that are not unix seconds come back unchanged.
pub fn display_name(name: &str) -> String {
    let stem = name.split('.').next().unwrap_or(name);

    stem.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|utc| utc.with_timezone(&Local).format("%e %b %Y %T").to_string())
        .unwrap_or_else(|| name.to_string())
}

/// The `list` output for `dir`: one `label<TAB>file` line per recording, where the label
/// is the start time or, with `parse_timestamps` off, the file name itself.
pub fn listing(dir: &Path, descending: bool, parse_timestamps: bool) -> Vec<String> {
    list_recordings(dir, descending)
        .into_iter()
        .map(|name| {
            let label = if parse_timestamps {
                display_name(&name)
            } else {
                name.clone()
            };
            format!("{label}\t{name}")
        })
        .collect()
}
