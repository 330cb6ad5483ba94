// src/cli/handlers/commons.rs

// Shared setup for the handlers: settings, a state machine bound to the real
// process environment, and notification printing.

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use crate::{
    config::{self, Settings},
    core::{
        cache::EnvironmentCache,
        overlay,
        state_machine::{EnvironmentStateMachine, NotificationSink},
    },
    models::{ContextState, EnvMap, Notification, Overlay},
    system::env_store::{EnvironmentStore, ProcessEnvironment},
};

/// Parses handler arguments, exiting with clap's own output on `--help` or
/// usage errors.
pub fn parse_args<T: Parser>(args: &[String]) -> T {
    T::try_parse_from(args).unwrap_or_else(|e| e.exit())
}

/// Loads the user settings from the default location.
pub fn load_settings() -> Result<Settings> {
    config::load_settings(None).context("Failed to load envsync settings")
}

/// A state machine driving this process's own environment.
#[derive(Debug)]
pub struct Session {
    machine: EnvironmentStateMachine,
    store: Arc<ProcessEnvironment>,
    baseline: EnvMap,
}

impl Session {
    pub fn open() -> Result<Self> {
        Self::with_settings(&load_settings()?)
    }

    pub fn with_settings(settings: &Settings) -> Result<Self> {
        let exporter = settings.build_exporter()?;
        let cache = EnvironmentCache::new(settings.cache_root()?);
        let store = Arc::new(ProcessEnvironment);
        let baseline = store.snapshot();
        let sink: Arc<dyn NotificationSink> = Arc::new(print_notification);

        let machine = EnvironmentStateMachine::spawn(
            Arc::new(cache),
            store.clone(),
            Arc::new(exporter),
            sink,
            settings.machine_options(),
        )
        .context("Failed to start the environment worker")?;

        Ok(Self {
            machine,
            store,
            baseline,
        })
    }

    pub fn machine(&self) -> &EnvironmentStateMachine {
        &self.machine
    }

    /// Switches to each path in order and waits for the last switch to finish.
    /// Fails when the final context could not be loaded.
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<()> {
        for path in paths {
            self.machine.push(Some(path.as_ref()));
        }
        self.machine.settle()?;
        finish_progress_line();

        match self.machine.state() {
            ContextState::Failed { directory, reason } => {
                bail!("Could not load '{}': {}", directory.display(), reason)
            }
            ContextState::Idle if !paths.is_empty() && !self.machine.exporter().is_available() => {
                bail!("'{}' is not available", self.machine.exporter().name())
            }
            _ => Ok(()),
        }
    }

    /// What the loaded overlay changed compared to the environment at startup.
    pub fn changes(&self) -> Overlay {
        overlay::diff_environments(&self.baseline, &self.store.snapshot())
    }
}

/// Prints a notification on stderr. Spinner frames overwrite each other and
/// are only shown on a terminal.
pub fn print_notification(notification: &Notification) {
    let mut stderr = io::stderr().lock();
    let on_terminal = stderr.is_terminal();
    let clear = if on_terminal { "\r\x1b[2K" } else { "" };
    let tag = "envsync:".cyan().bold();

    // Nothing sensible to do when stderr is gone.
    let _ = match notification {
        Notification::Loading { .. } if !on_terminal => Ok(()),
        Notification::Loading { .. } => {
            write!(stderr, "{clear}{tag} {notification}").and_then(|()| stderr.flush())
        }
        Notification::Error(_) | Notification::ToolNotFound(_) => {
            writeln!(stderr, "{clear}{tag} {}", notification.to_string().red())
        }
        Notification::Loaded(_) | Notification::Unloaded(_) => {
            writeln!(stderr, "{clear}{tag} {notification}")
        }
    };
}

/// Erases a spinner frame left behind by a load that produced no message.
fn finish_progress_line() {
    let mut stderr = io::stderr().lock();
    if stderr.is_terminal() {
        let _ = write!(stderr, "\r\x1b[2K");
        let _ = stderr.flush();
    }
}
