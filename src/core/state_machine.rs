// src/core/state_machine.rs

//! The environment state machine.
//!
//! Context changes are queued onto one dedicated worker thread and handled
//! strictly in submission order, so rollbacks and applications never interleave
//! on the shared process environment. The caller only ever enqueues.

use crate::core::cache::EnvironmentCache;
use crate::core::context_resolver::find_context_root;
use crate::core::overlay;
use crate::core::progress::ProgressNotifier;
use crate::constants::{DEFAULT_METADATA_PREFIX, DEFAULT_TICK_INTERVAL_MS};
use crate::models::{ContextState, Notification, Overlay, RollbackSet};
use crate::system::env_store::EnvironmentStore;
use crate::system::executor::ExecutionError;
use crate::system::exporter::Exporter;
use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// Receives the human-readable events produced by the state machine. Called
/// from the worker thread and from the progress ticker.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification);
    }
}

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Executable '{0}' was not found.")]
    ToolNotFound(String),
    #[error("Export failed in '{}' with exit code {exit_code}: {}", .directory.display(), .stderr.trim_end())]
    ExportFailed {
        directory: PathBuf,
        exit_code: i32,
        stderr: String,
    },
    #[error("Exporter returned malformed output for '{}': {source}", .directory.display())]
    MalformedOutput {
        directory: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Exporter could not run in '{}': {source}", .directory.display())]
    Execution {
        directory: PathBuf,
        #[source]
        source: ExecutionError,
    },
    #[error("The environment worker has stopped.")]
    WorkerGone,
}

/// Tunables of the state machine.
#[derive(Debug, Clone)]
pub struct MachineOptions {
    /// Exported keys starting with this prefix are metadata.
    pub metadata_prefix: String,
    pub tick_interval: Duration,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

enum Job {
    Push(Option<PathBuf>),
    Settle(Sender<()>),
}

/// Handle to the worker that owns the active context.
pub struct EnvironmentStateMachine {
    queue: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    state: Arc<Mutex<ContextState>>,
    cache: Arc<EnvironmentCache>,
    exporter: Arc<dyn Exporter>,
    sink: Arc<dyn NotificationSink>,
    missing_tool_reported: AtomicBool,
}

impl fmt::Debug for EnvironmentStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentStateMachine")
            .field("state", &self.state())
            .field("exporter", &self.exporter)
            .field("running", &self.queue.is_some())
            .finish_non_exhaustive()
    }
}

impl EnvironmentStateMachine {
    /// Starts the worker thread. Nothing is loaded until the first `push`.
    pub fn spawn(
        cache: Arc<EnvironmentCache>,
        store: Arc<dyn EnvironmentStore>,
        exporter: Arc<dyn Exporter>,
        sink: Arc<dyn NotificationSink>,
        options: MachineOptions,
    ) -> io::Result<Self> {
        let state = Arc::new(Mutex::new(ContextState::Idle));
        let engine = Engine {
            cache: Arc::clone(&cache),
            store,
            exporter: Arc::clone(&exporter),
            sink: Arc::clone(&sink),
            progress: ProgressNotifier::new(options.tick_interval),
            metadata_prefix: options.metadata_prefix,
            current: None,
            rollback: RollbackSet::new(),
            state: Arc::clone(&state),
        };

        let (queue, jobs) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("envsync-worker".to_string())
            .spawn(move || run_worker(engine, jobs))?;

        Ok(Self {
            queue: Some(queue),
            worker: Some(worker),
            state,
            cache,
            exporter,
            sink,
            missing_tool_reported: AtomicBool::new(false),
        })
    }

    /// Queues a context change and returns immediately.
    ///
    /// `Some(path)` loads the context root of `path` (re-running the exporter
    /// even when it is already active); `None` unloads whatever is active. While
    /// the exporter cannot be found, pushes with a path are ignored and the
    /// problem is reported once.
    pub fn push(&self, path: Option<&Path>) {
        if path.is_some() && !self.exporter_available() {
            return;
        }
        self.enqueue(Job::Push(path.map(Path::to_path_buf)));
    }

    /// Blocks until every push queued before this call has been handled.
    pub fn settle(&self) -> Result<(), UpdateError> {
        let (done, wait) = mpsc::channel();
        let queue = self.queue.as_ref().ok_or(UpdateError::WorkerGone)?;
        queue
            .send(Job::Settle(done))
            .map_err(|_| UpdateError::WorkerGone)?;
        wait.recv().map_err(|_| UpdateError::WorkerGone)
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> ContextState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Unloads the active context, drains the queue and stops the worker.
    pub fn shutdown(mut self) {
        self.enqueue(Job::Push(None));
        self.stop();
    }

    pub fn cache(&self) -> &Arc<EnvironmentCache> {
        &self.cache
    }

    pub(crate) fn exporter(&self) -> &Arc<dyn Exporter> {
        &self.exporter
    }

    pub(crate) fn notify(&self, notification: &Notification) {
        self.sink.notify(notification);
    }

    fn exporter_available(&self) -> bool {
        if self.exporter.is_available() {
            self.missing_tool_reported.store(false, Ordering::SeqCst);
            return true;
        }
        if !self.missing_tool_reported.swap(true, Ordering::SeqCst) {
            log::warn!("'{}' is not available; environment updates are paused", self.exporter.name());
            self.notify(&Notification::ToolNotFound(self.exporter.name().to_string()));
        }
        false
    }

    fn enqueue(&self, job: Job) {
        let sent = self.queue.as_ref().is_some_and(|queue| queue.send(job).is_ok());
        if !sent {
            log::error!("The environment worker has stopped; dropping queued update");
        }
    }

    fn stop(&mut self) {
        // Closing the queue lets the worker drain what is left and exit.
        self.queue.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("The environment worker terminated abnormally");
        }
    }
}

impl Drop for EnvironmentStateMachine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(mut engine: Engine, jobs: Receiver<Job>) {
    log::debug!("Environment worker started");
    for job in jobs {
        match job {
            Job::Push(path) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.update(path.as_deref())));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::error!("Environment update failed: {}", e),
                    Err(payload) => {
                        let reason = panic_message(&*payload);
                        log::error!("Environment update panicked ({}); restoring the baseline", reason);
                        engine.recover(&reason);
                    }
                }
            }
            Job::Settle(done) => {
                let _ = done.send(());
            }
        }
    }
    log::debug!("Environment worker stopped");
}

/// The state owned by the worker thread.
struct Engine {
    cache: Arc<EnvironmentCache>,
    store: Arc<dyn EnvironmentStore>,
    exporter: Arc<dyn Exporter>,
    sink: Arc<dyn NotificationSink>,
    progress: ProgressNotifier,
    metadata_prefix: String,
    current: Option<PathBuf>,
    rollback: RollbackSet,
    state: Arc<Mutex<ContextState>>,
}

impl Engine {
    fn update(&mut self, path: Option<&Path>) -> Result<(), UpdateError> {
        let candidate = path.and_then(find_context_root);
        let previous = self.current.take();

        // Back to the baseline before the next overlay is even computed.
        overlay::restore(self.store.as_ref(), std::mem::take(&mut self.rollback));

        let Some(directory) = candidate else {
            if let Some(previous) = previous {
                self.sink.notify(&Notification::Unloaded(previous));
            }
            self.set_state(ContextState::Idle);
            return Ok(());
        };

        self.set_state(ContextState::Loading(directory.clone()));
        match self.load(&directory) {
            Ok((next, exported)) => {
                // Recorded before the first write so a panic midway can still be undone.
                let rollback =
                    overlay::compute_rollback(self.store.as_ref(), &next, &self.metadata_prefix);
                self.rollback = rollback.clone();
                self.current = Some(directory.clone());
                overlay::write_overlay(self.store.as_ref(), &next, &rollback);

                if exported || previous.as_deref() != Some(directory.as_path()) {
                    self.sink.notify(&Notification::Loaded(directory.clone()));
                }
                self.set_state(ContextState::Loaded {
                    directory,
                    rollback,
                });
                Ok(())
            }
            Err(error) => {
                self.sink.notify(&failure_notification(&error));
                self.set_state(ContextState::Failed {
                    directory,
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Runs the exporter for `directory`. Returns the overlay to apply and
    /// whether the exporter reported anything new.
    fn load(&self, directory: &Path) -> Result<(Overlay, bool), UpdateError> {
        let cached = self.cache.get(directory).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable cache entry: {}", e);
            Overlay::new()
        });
        let env = overlay::merge_environment(self.store.snapshot(), &cached);

        let sink = &self.sink;
        let output = self
            .progress
            .with_progress(
                |tick| {
                    sink.notify(&Notification::Loading {
                        directory: directory.to_path_buf(),
                        tick: tick.to_string(),
                    });
                },
                || self.exporter.export(directory, &env),
            )
            .map_err(|source| match source {
                ExecutionError::NotFound(tool) => UpdateError::ToolNotFound(tool),
                source => UpdateError::Execution {
                    directory: directory.to_path_buf(),
                    source,
                },
            })?;

        if !output.success() {
            return Err(UpdateError::ExportFailed {
                directory: directory.to_path_buf(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        if output.stdout.trim().is_empty() {
            return Ok((cached, false));
        }

        let exported =
            Overlay::from_json(&output.stdout).map_err(|source| UpdateError::MalformedOutput {
                directory: directory.to_path_buf(),
                source,
            })?;
        let merged = cached.merged(&exported);
        if let Err(e) = self.cache.set(directory, &merged) {
            log::warn!("Could not persist overlay for '{}': {}", directory.display(), e);
        }
        Ok((merged, true))
    }

    /// Brings the environment back to its baseline after a task panicked and
    /// reports the directory that was being loaded as failed.
    fn recover(&mut self, reason: &str) {
        overlay::restore(self.store.as_ref(), std::mem::take(&mut self.rollback));
        let current = self.current.take();

        let interrupted = match self.state() {
            ContextState::Loading(directory) | ContextState::Loaded { directory, .. } => {
                Some(directory)
            }
            ContextState::Failed { directory, .. } => Some(directory),
            ContextState::Idle => current,
        };
        let Some(directory) = interrupted else {
            self.set_state(ContextState::Idle);
            return;
        };

        let reason = format!("environment update panicked: {reason}");
        self.sink.notify(&Notification::Error(format!(
            "Loading '{}' failed, {}",
            directory.display(),
            reason
        )));
        self.set_state(ContextState::Failed { directory, reason });
    }

    fn state(&self) -> ContextState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_state(&self, next: ContextState) {
        log::debug!("Context state -> {:?}", next);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn failure_notification(error: &UpdateError) -> Notification {
    match error {
        UpdateError::ToolNotFound(tool) => Notification::ToolNotFound(tool.clone()),
        UpdateError::ExportFailed { stderr, .. } if !stderr.trim().is_empty() => {
            Notification::Error(stderr.clone())
        }
        other => Notification::Error(other.to_string()),
    }
}
