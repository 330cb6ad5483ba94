//! Test-only doubles for the exporter and the notification sink.

use crate::core::state_machine::NotificationSink;
use crate::models::{EnvMap, Notification};
use crate::system::executor::{ExecutionError, ProcessOutput};
use crate::system::exporter::Exporter;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};

/// What the scripted exporter does on its next call.
#[derive(Debug)]
pub enum Reply {
    Output(ProcessOutput),
    Fail(ExecutionError),
    Panic,
}

/// A zero-exit reply with `stdout`.
pub fn ok(stdout: &str) -> Reply {
    Reply::Output(ProcessOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

/// A failing reply with `stderr`.
pub fn failed(exit_code: i32, stderr: &str) -> Reply {
    Reply::Output(ProcessOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

/// One recorded exporter invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub subcommand: &'static str,
    pub directory: PathBuf,
    pub env: Option<EnvMap>,
}

/// An exporter that replays queued replies and records every call. When the
/// queue is empty it answers with an empty, successful export.
#[derive(Debug)]
pub struct ScriptedExporter {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    available: AtomicBool,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Default for ScriptedExporter {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            gate: Mutex::new(None),
        }
    }
}

impl ScriptedExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next `export` block until the returned sender fires (or drops).
    pub fn hold_next_export(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, subcommand: &'static str, directory: &Path, env: Option<&EnvMap>) -> Result<ProcessOutput, ExecutionError> {
        self.calls.lock().unwrap().push(Call {
            subcommand,
            directory: directory.to_path_buf(),
            env: env.cloned(),
        });
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| ok(""));
        match reply {
            Reply::Output(output) => Ok(output),
            Reply::Fail(error) => Err(error),
            Reply::Panic => panic!("scripted exporter panic"),
        }
    }
}

impl Exporter for ScriptedExporter {
    fn export(&self, directory: &Path, env: &EnvMap) -> Result<ProcessOutput, ExecutionError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        self.answer("export", directory, Some(env))
    }

    fn allow(&self, directory: &Path) -> Result<ProcessOutput, ExecutionError> {
        self.answer("allow", directory, None)
    }

    fn deny(&self, directory: &Path) -> Result<ProcessOutput, ExecutionError> {
        self.answer("deny", directory, None)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "direnv"
    }
}

/// A sink that keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }

    /// Everything except the spinner ticks.
    pub fn settled(&self) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|n| !matches!(n, Notification::Loading { .. }))
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        self.events.lock().unwrap().push(notification.clone());
    }
}
