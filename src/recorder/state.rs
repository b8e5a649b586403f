use anyhow::Result;
use std::time::Duration;
use tokio::time::Instant;

use super::frame::{mean_squared_difference, Frame};

/// Detection tunables, fixed for the lifetime of the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    /// Minimum mean squared difference that counts as motion.
    pub threshold: f64,
    /// Quiet time after the last motion before a recording is closed.
    pub hold_time: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 20.0,
            hold_time: Duration::from_secs_f64(2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    StartRecording,
    StopRecording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecorderStatus {
    pub is_recording: bool,
    /// Only meaningful while recording, or on the cycle that stopped it.
    pub last_motion: Option<Instant>,
}

/// Decide what a single frame comparison does to the recorder.
///
/// Both comparisons are strict: `mse == threshold` is not motion, and a recording
/// survives until the quiet period exceeds `hold_time`.
pub fn transition(
    status: RecorderStatus,
    mse: f64,
    now: Instant,
    config: &DetectionConfig,
) -> (RecorderStatus, Action) {
    if mse > config.threshold {
        let action = if status.is_recording {
            Action::None
        } else {
            Action::StartRecording
        };
        let next = RecorderStatus {
            is_recording: true,
            last_motion: Some(now),
        };
        return (next, action);
    }

    let hold_expired = status
        .last_motion
        .map(|last| now.saturating_duration_since(last) > config.hold_time)
        .unwrap_or(true);

    if status.is_recording && hold_expired {
        let next = RecorderStatus {
            is_recording: false,
            ..status
        };
        (next, Action::StopRecording)
    } else {
        (status, Action::None)
    }
}

/// Result of feeding one frame to [`DetectionState::observe`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// `None` on the very first frame, which has nothing to compare against.
    pub mse: Option<f64>,
    pub action: Action,
}

/// Everything the loop carries from one frame to the next.
#[derive(Debug, Default)]
pub struct DetectionState {
    previous_frame: Option<Frame>,
    status: RecorderStatus,
}

impl DetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.status.is_recording
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn observe(
        &mut self,
        frame: Frame,
        now: Instant,
        config: &DetectionConfig,
    ) -> Result<Observation> {
        let observation = match self.previous_frame.as_ref() {
            None => Observation {
                mse: None,
                action: Action::None,
            },
            Some(previous) => {
                let mse = mean_squared_difference(&frame, previous)?;
                let (next, action) = transition(self.status, mse, now, config);
                self.status = next;
                Observation {
                    mse: Some(mse),
                    action,
                }
            }
        };

        self.previous_frame = Some(frame);
        Ok(observation)
    }

    /// Close the recording regardless of hold time. Returns whether one was open, so
    /// repeated calls stop at most once.
    pub fn force_stop(&mut self) -> bool {
        std::mem::replace(&mut self.status.is_recording, false)
    }
}
