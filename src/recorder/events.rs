use std::path::PathBuf;

use serde::Serialize;

/// Observable side effects of the recorder loop, broadcast to subscribers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecorderEvent {
    /// Rising edge: motion seen while idle, a new recording was opened.
    #[serde(rename_all = "camelCase")]
    MotionStarted { mse: f64, output: PathBuf },
    /// Hold time expired, or the loop shut down, while recording.
    #[serde(rename_all = "camelCase")]
    RecordingStopped { output: PathBuf },
    #[serde(rename_all = "camelCase")]
    TriggerFailed { command: String, error: String },
    /// Starting or finalizing `output` failed. The state machine carries on regardless.
    #[serde(rename_all = "camelCase")]
    EncoderFailed { output: PathBuf, error: String },
}
