pub mod camera;
pub mod recorder;
pub mod recordings;
pub mod settings;
pub mod trigger;
mod utils;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Error, Result};
use log::{error, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use camera::{Camera, FfmpegCamera};
use recorder::{RecorderController, RecorderEvent};
use recordings::listing;
use settings::{resolve_config_path, Settings, CONFIG_ENV_VAR};
use trigger::{CommandTrigger, SideAction};

enum Mode {
    Record,
    List,
}

/// Entry point for the `motionrec` binary. Returns the process exit code.
///
/// `motionrec [config]` records until interrupted; `motionrec list [config]` prints the
/// recordings already in the output directory.
pub fn run() -> i32 {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (mode, config_arg) = match args.first().map(String::as_str) {
        Some("list") => (Mode::List, args.get(1)),
        _ => (Mode::Record, args.first()),
    };

    let config_path = resolve_config_path(
        config_arg.map(String::as_str),
        std::env::var(CONFIG_ENV_VAR).ok(),
    );

    let settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err:#}");
            return 1;
        }
    };

    let result = match mode {
        Mode::List => {
            print_recordings(&settings);
            Ok(())
        }
        Mode::Record => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")
            .and_then(|runtime| runtime.block_on(record(settings))),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            error!("{err:#}");
            1
        }
    }
}

fn print_recordings(settings: &Settings) {
    let lines = listing(
        &settings.output_dir,
        settings.sort_descending,
        settings.parse_timestamps,
    );
    for line in lines {
        println!("{line}");
    }
}

async fn record(settings: Settings) -> Result<()> {
    info!("motionrec starting up...");

    std::fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            settings.output_dir.display()
        )
    })?;

    let mut camera = FfmpegCamera::new();
    camera
        .configure(&settings.stream)
        .await
        .context("camera configuration failed")?;

    let mut controller = RecorderController::new();
    let trigger = build_trigger(&settings, controller.event_sender());
    let reporter = tokio::spawn(report_motion(controller.subscribe(), std::io::stdout()));

    controller.start(camera, trigger, settings.loop_options()?)?;

    if let Some(token) = controller.cancel_token() {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    token.cancel();
                }
                Err(err) => warn!("cannot listen for Ctrl-C: {err}"),
            }
        });
    }

    let result = controller.wait().await;

    // The loop task has ended, so this drops the last sender and the reporter drains
    // whatever is still queued before it sees the channel close.
    drop(controller);
    if let Err(err) = reporter.await {
        warn!("motion reporter ended abnormally: {err}");
    }
    result
}

fn build_trigger(
    settings: &Settings,
    events: broadcast::Sender<RecorderEvent>,
) -> Option<Arc<dyn SideAction>> {
    let trigger = CommandTrigger::from_setting(settings.trigger_command.as_deref())?;
    info!("trigger command: {}", trigger.program());

    let trigger = trigger.with_error_callback(Arc::new(move |program: &str, err: &Error| {
        error!("trigger command `{program}` failed to launch: {err:#}");
        let _ = events.send(RecorderEvent::TriggerFailed {
            command: program.to_string(),
            error: format!("{err:#}"),
        });
    }));
    Some(Arc::new(trigger))
}

/// Write one line per new motion, the recorder's user-visible output. Runs until every
/// sender is gone.
async fn report_motion<W: Write>(mut events: broadcast::Receiver<RecorderEvent>, mut out: W) {
    loop {
        match events.recv().await {
            Ok(RecorderEvent::MotionStarted { mse, .. }) => {
                if let Err(err) = writeln!(out, "New Motion {mse}").and_then(|()| out.flush()) {
                    warn!("cannot report motion: {err}");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("motion reporter skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn reporter_drains_queued_motion_before_closing() {
        let (tx, rx) = broadcast::channel(8);
        let output = PathBuf::from("/srv/motion/1700000000.mp4");

        tx.send(RecorderEvent::MotionStarted {
            mse: 625.0,
            output: output.clone(),
        })
        .unwrap();
        tx.send(RecorderEvent::RecordingStopped { output }).unwrap();
        drop(tx);

        let mut out = Vec::new();
        report_motion(rx, &mut out).await;

        assert_eq!(String::from_utf8(out).unwrap(), "New Motion 625\n");
    }
}
