use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::recordings::recording_path;

/// An open recording: where the encoder writes, and when it was opened.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub output: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl RecordingSession {
    /// Name the recording after the wall-clock second it starts in.
    pub fn open(output_dir: &Path, started_at: DateTime<Utc>) -> Self {
        Self {
            output: recording_path(output_dir, started_at.timestamp()),
            started_at,
        }
    }
}
