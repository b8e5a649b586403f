use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::camera::Camera;
use crate::trigger::SideAction;

use super::events::RecorderEvent;
use super::loop_worker::{recorder_loop, LoopOptions};

const EVENT_CAPACITY: usize = 64;

/// Owns the recorder task and the token that shuts it down.
pub struct RecorderController {
    handle: Option<JoinHandle<Result<()>>>,
    cancel_token: Option<CancellationToken>,
    events: broadcast::Sender<RecorderEvent>,
}

impl RecorderController {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            handle: None,
            cancel_token: None,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// Sender side of the event stream, for collaborators that report on their own
    /// (the trigger's error callback).
    pub fn event_sender(&self) -> broadcast::Sender<RecorderEvent> {
        self.events.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Token that stops the running loop when cancelled.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.cancel_token.clone()
    }

    pub fn start<C>(
        &mut self,
        camera: C,
        trigger: Option<Arc<dyn SideAction>>,
        options: LoopOptions,
    ) -> Result<()>
    where
        C: Camera + 'static,
    {
        if self.handle.is_some() {
            bail!("recorder already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let events = self.events.clone();

        info!(
            "Starting recorder: threshold={}, hold={:?}, output={}",
            options.detection.threshold,
            options.detection.hold_time,
            options.output_dir.display()
        );

        let handle = tokio::spawn(async move {
            let mut camera = camera;
            recorder_loop(
                &mut camera,
                trigger.as_deref(),
                &options,
                &events,
                &token_clone,
            )
            .await
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Wait for the loop to end on its own, returning its result.
    pub async fn wait(&mut self) -> Result<()> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle.await.context("recorder task failed to join")?,
            None => Ok(()),
        }
    }

    /// Cancel the loop and wait for it to close any open recording.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.wait().await
    }
}

impl Default for RecorderController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FrameSize;
    use crate::recorder::state::DetectionConfig;
    use crate::recorder::testing::{FakeCamera, RecordingTrigger};
    use std::path::PathBuf;
    use std::time::Duration;

    fn options() -> LoopOptions {
        LoopOptions {
            detection: DetectionConfig::default(),
            low_res: FrameSize::new(2, 2),
            output_dir: PathBuf::from("/srv/motion"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_recording_and_joins() {
        let camera = FakeCamera::new(Duration::from_millis(50))
            .frames([0, 0, 120].map(|v| vec![v; 4]))
            .then_wait_forever();
        let log = camera.log_handle();
        let trigger = Arc::new(RecordingTrigger::default());

        let mut controller = RecorderController::new();
        let mut events = controller.subscribe();
        controller
            .start(camera, Some(trigger.clone() as Arc<dyn SideAction>), options())
            .unwrap();
        assert!(controller.start(FakeCamera::new(Duration::ZERO), None, options()).is_err());

        match events.recv().await.unwrap() {
            RecorderEvent::MotionStarted { mse, .. } => assert_eq!(mse, 14400.0),
            other => panic!("unexpected event {other:?}"),
        }

        controller.stop().await.unwrap();

        assert!(!controller.is_running());
        assert_eq!(trigger.count(), 1);
        assert_eq!(log.lock().unwrap().stopped, 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            RecorderEvent::RecordingStopped { .. }
        ));

        // Second stop has nothing left to do.
        controller.stop().await.unwrap();
        assert_eq!(log.lock().unwrap().stopped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_surfaces_capture_failure() {
        let camera = FakeCamera::new(Duration::from_millis(50)).frames([vec![9; 4]]);

        let mut controller = RecorderController::new();
        controller.start(camera, None, options()).unwrap();

        let err = controller.wait().await.unwrap_err();
        assert!(format!("{err:#}").contains("script exhausted"));
    }
}
