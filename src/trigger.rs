//! Best-effort side actions fired on the rising edge of motion.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Error};
use tokio::process::Command;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

/// Receives the command and the reason it could not be launched.
pub type ErrorCallback = Arc<dyn Fn(&str, &Error) + Send + Sync>;

/// An action the recorder starts and never waits on.
///
/// `fire` must return promptly. Whatever the action does afterwards is invisible to the
/// loop, and its failures must not reach it.
pub trait SideAction: Send + Sync {
    fn fire(&self);
}

/// Launches an external program with no arguments.
pub struct CommandTrigger {
    program: String,
    on_error: ErrorCallback,
}

impl CommandTrigger {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            on_error: Arc::new(|program: &str, err: &Error| {
                log_error!("trigger command `{program}` failed to launch: {err:#}");
            }),
        }
    }

    /// Build from the configured command; blank or missing means no trigger.
    pub fn from_setting(setting: Option<&str>) -> Option<Self> {
        setting
            .map(str::trim)
            .filter(|program| !program.is_empty())
            .map(Self::new)
    }

    pub fn with_error_callback(mut self, on_error: ErrorCallback) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SideAction for CommandTrigger {
    fn fire(&self) {
        let spawned = Command::new(&self.program)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("could not start `{}`", self.program));

        match spawned {
            Ok(mut child) => {
                let program = self.program.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) => log_debug!("trigger `{program}` exited with {status}"),
                        Err(err) => log_warn!("lost track of trigger `{program}`: {err}"),
                    }
                });
            }
            Err(err) => (self.on_error)(&self.program, &err),
        }
    }
}
