use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::camera::{Camera, FrameSize};
use crate::trigger::SideAction;

use super::events::RecorderEvent;
use super::frame::Frame;
use super::session::RecordingSession;
use super::state::{Action, DetectionConfig, DetectionState};

// Set to false to silence this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Everything the loop needs that does not change while it runs.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub detection: DetectionConfig,
    pub low_res: FrameSize,
    pub output_dir: PathBuf,
}

/// Side-effect handles shared by the loop and its helpers.
struct Effects<'a, C> {
    camera: &'a mut C,
    trigger: Option<&'a dyn SideAction>,
    events: &'a broadcast::Sender<RecorderEvent>,
    session: Option<RecordingSession>,
}

/// Run the detection loop until `cancel_token` fires or the camera fails.
///
/// A camera error ends the loop with that error. Encoder and trigger failures are
/// reported and the loop keeps going. Any recording still open on exit is stopped.
pub async fn recorder_loop<C: Camera>(
    camera: &mut C,
    trigger: Option<&dyn SideAction>,
    options: &LoopOptions,
    events: &broadcast::Sender<RecorderEvent>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let mut state = DetectionState::new();
    let mut effects = Effects {
        camera,
        trigger,
        events,
        session: None,
    };

    let result = loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("recorder loop shutting down");
                break Ok(());
            }
            captured = effects.camera.capture_low_res() => {
                let step = captured
                    .context("frame acquisition failed")
                    .and_then(|buffer| Frame::from_buffer(&buffer, options.low_res))
                    .and_then(|frame| state.observe(frame, Instant::now(), &options.detection));

                let observation = match step {
                    Ok(observation) => observation,
                    Err(err) => break Err(err),
                };

                let Some(mse) = observation.mse else {
                    continue;
                };
                log_debug!("frame mse={mse:.3}");

                match observation.action {
                    Action::StartRecording => effects.start_recording(mse, &options.output_dir).await,
                    Action::StopRecording => {
                        log_info!("no motion for {:?}, stopping", options.detection.hold_time);
                        effects.stop_recording().await;
                    }
                    Action::None => {}
                }
            }
        }
    };

    if state.force_stop() {
        effects.stop_recording().await;
    }

    result
}

impl<C: Camera> Effects<'_, C> {
    async fn start_recording(&mut self, mse: f64, output_dir: &std::path::Path) {
        let session = RecordingSession::open(output_dir, Utc::now());

        if let Err(err) = self.camera.start_encoding(&session.output).await {
            log_error!("failed to start encoder for {}: {err:#}", session.output.display());
            self.emit(RecorderEvent::EncoderFailed {
                output: session.output.clone(),
                error: format!("{err:#}"),
            });
        }

        log_info!("New motion (mse={mse:.2}), recording to {}", session.output.display());
        self.emit(RecorderEvent::MotionStarted {
            mse,
            output: session.output.clone(),
        });

        if let Some(trigger) = self.trigger {
            trigger.fire();
        }

        self.session = Some(session);
    }

    async fn stop_recording(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if let Err(err) = self.camera.stop_encoding().await {
            log_error!("failed to finalize {}: {err:#}", session.output.display());
            self.emit(RecorderEvent::EncoderFailed {
                output: session.output.clone(),
                error: format!("{err:#}"),
            });
        }

        let length = (Utc::now() - session.started_at).num_seconds();
        log_info!("Closed {} after {length}s", session.output.display());
        self.emit(RecorderEvent::RecordingStopped {
            output: session.output,
        });
    }

    fn emit(&self, event: RecorderEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
