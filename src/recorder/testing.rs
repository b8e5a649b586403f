//! Scripted stand-ins for the camera and trigger.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::camera::{Camera, StreamConfig};
use crate::trigger::SideAction;

#[derive(Debug, Default, Clone)]
pub struct CameraLog {
    pub delivered: usize,
    pub started: Vec<PathBuf>,
    pub stopped: usize,
    /// Frames delivered when the first real stop happened.
    pub stopped_after_frame: Option<usize>,
}

/// Plays back a fixed list of frames, one per `interval`, then fails or stalls.
pub struct FakeCamera {
    interval: Duration,
    frames: VecDeque<Vec<u8>>,
    wait_forever: bool,
    fail_encoder: bool,
    fail_finalize: bool,
    encoding: bool,
    log: Arc<Mutex<CameraLog>>,
}

impl FakeCamera {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            frames: VecDeque::new(),
            wait_forever: false,
            fail_encoder: false,
            fail_finalize: false,
            encoding: false,
            log: Arc::default(),
        }
    }

    pub fn frames(mut self, frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Block on capture once the script runs out, instead of returning an error.
    pub fn then_wait_forever(mut self) -> Self {
        self.wait_forever = true;
        self
    }

    pub fn failing_encoder(mut self) -> Self {
        self.fail_encoder = true;
        self
    }

    /// Starts fine but reports a broken recording when stopped.
    pub fn failing_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    pub fn log(&self) -> CameraLog {
        self.log.lock().unwrap().clone()
    }

    pub fn log_handle(&self) -> Arc<Mutex<CameraLog>> {
        Arc::clone(&self.log)
    }
}

impl Camera for FakeCamera {
    async fn configure(&mut self, _config: &StreamConfig) -> Result<()> {
        Ok(())
    }

    async fn capture_low_res(&mut self) -> Result<Vec<u8>> {
        tokio::time::sleep(self.interval).await;

        match self.frames.pop_front() {
            Some(frame) => {
                self.log.lock().unwrap().delivered += 1;
                Ok(frame)
            }
            None if self.wait_forever => std::future::pending().await,
            None => bail!("script exhausted"),
        }
    }

    async fn start_encoding(&mut self, output: &Path) -> Result<()> {
        if self.fail_encoder {
            bail!("encoder unavailable");
        }
        self.encoding = true;
        self.log.lock().unwrap().started.push(output.to_path_buf());
        Ok(())
    }

    async fn stop_encoding(&mut self) -> Result<()> {
        if !self.encoding {
            return Ok(());
        }
        self.encoding = false;

        let mut log = self.log.lock().unwrap();
        log.stopped += 1;
        let delivered = log.delivered;
        log.stopped_after_frame.get_or_insert(delivered);
        if self.fail_finalize {
            bail!("encoder stopped accepting frames");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTrigger {
    fired: AtomicUsize,
}

impl RecordingTrigger {
    pub fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl SideAction for RecordingTrigger {
    fn fire(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}
