use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::camera::StreamConfig;
use crate::recorder::{DetectionConfig, LoopOptions};

pub const CONFIG_ENV_VAR: &str = "MOTIONREC_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "motionrec.json";

/// Recorder configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub threshold: f64,
    pub hold_time_secs: f64,
    pub output_dir: PathBuf,
    pub trigger_command: Option<String>,
    /// `motionrec list` shows the newest recording first.
    pub sort_descending: bool,
    /// `motionrec list` shows start times instead of bare file names.
    pub parse_timestamps: bool,
    pub stream: StreamConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: 20.0,
            hold_time_secs: 2.0,
            output_dir: PathBuf::new(),
            trigger_command: None,
            sort_descending: true,
            parse_timestamps: true,
            stream: StreamConfig::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            bail!("outputDir is required");
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            bail!("threshold must be a non-negative number, got {}", self.threshold);
        }
        self.hold_time()?;

        let stream = &self.stream;
        for (name, size) in [("highRes", stream.high_res), ("lowRes", stream.low_res)] {
            if size.pixel_count() == 0 {
                bail!("{name} must have a non-zero width and height");
            }
        }
        if stream.framerate == 0 {
            bail!("framerate must be greater than zero");
        }
        Ok(())
    }

    /// Fails for negative, non-finite or out-of-range values.
    pub fn hold_time(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.hold_time_secs).with_context(|| {
            format!(
                "holdTimeSecs must be a non-negative number of seconds, got {}",
                self.hold_time_secs
            )
        })
    }

    pub fn loop_options(&self) -> Result<LoopOptions> {
        Ok(LoopOptions {
            detection: DetectionConfig {
                threshold: self.threshold,
                hold_time: self.hold_time()?,
            },
            low_res: self.stream.low_res,
            output_dir: self.output_dir.clone(),
        })
    }
}

/// Settings file to use: the explicit argument, then `$MOTIONREC_CONFIG`, then
/// `motionrec.json` in the working directory.
pub fn resolve_config_path(arg: Option<&str>, env_value: Option<String>) -> PathBuf {
    arg.map(PathBuf::from)
        .or_else(|| env_value.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
