// EN: src/system/executor.rs

use crate::models::EnvMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::ffi::OsString;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::process::{Command as StdCommand, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

lazy_static! {
    // CSI sequences plus the two-byte Fe escapes.
    static ref ANSI_ESCAPE_RE: Regex =
        Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ANSI escape regex is valid");
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Executable '{0}' was not found.")]
    NotFound(String),
    #[error("Executing '{0}' has failed: {1}")]
    CommandFailed(String, #[source] io::Error),
    #[error("Command '{command}' did not finish within {} seconds.", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Everything a finished child process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    /// Stderr with terminal escape sequences already removed.
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `argv` in `cwd` and captures its exit code and both output streams.
///
/// When `env` is given it replaces the inherited environment. Inherited variables
/// that are not valid UTF-8 cannot be carried by an `EnvMap`, so they are passed
/// through unchanged unless `env` redefines the name. A non-zero
/// exit is not an error: it is reported through `ProcessOutput::exit_code`. Only
/// failures to start (or to wait for) the child surface as `ExecutionError`.
///
/// Both pipes are drained concurrently, so large outputs cannot deadlock the child.
pub fn run_command(
    argv: &[String],
    cwd: &Path,
    env: Option<&EnvMap>,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ExecutionError> {
    let (program, args) = argv.split_first().ok_or(ExecutionError::EmptyCommand)?;
    let command_line = argv.join(" ");
    let clean_cwd = dunce::simplified(cwd);

    let mut command = StdCommand::new(program);
    command
        .args(args)
        .current_dir(clean_cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(env) = env {
        command
            .env_clear()
            .envs(non_utf8_vars(std::env::vars_os()))
            .envs(env);
    }

    log::debug!(
        "Spawning '{}' in '{}'{}",
        command_line,
        clean_cwd.display(),
        timeout
            .map(|t| format!(" (timeout {}s)", t.as_secs()))
            .unwrap_or_default()
    );

    let (status, stdout, stderr) = match timeout {
        None => {
            let output = command
                .output()
                .map_err(|e| spawn_error(program, &command_line, clean_cwd, e))?;
            (output.status, output.stdout, output.stderr)
        }
        Some(timeout) => wait_with_timeout(command, program, &command_line, clean_cwd, timeout)?,
    };

    let exit_code = exit_code(status);
    log::debug!("'{}' exited with code {}", command_line, exit_code);

    let stdout = String::from_utf8(stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
        command: command_line.clone(),
        source: e,
    })?;

    Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr: strip_ansi(&String::from_utf8_lossy(&stderr)),
    })
}

/// The variables of `vars` whose name or value is not valid UTF-8.
fn non_utf8_vars(
    vars: impl Iterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (OsString, OsString)> {
    vars.filter(|(key, value)| key.to_str().is_none() || value.to_str().is_none())
}

/// Removes ANSI/terminal control sequences from `text`.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE_RE.replace_all(text, "").into_owned()
}

fn spawn_error(program: &str, command_line: &str, cwd: &Path, e: io::Error) -> ExecutionError {
    // A missing working directory also reports `NotFound`; only blame the
    // executable when the directory is really there.
    if e.kind() == ErrorKind::NotFound && cwd.is_dir() {
        ExecutionError::NotFound(program.to_string())
    } else {
        ExecutionError::CommandFailed(command_line.to_string(), e)
    }
}

fn wait_with_timeout(
    mut command: StdCommand,
    program: &str,
    command_line: &str,
    cwd: &Path,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), ExecutionError> {
    let mut child = command
        .spawn()
        .map_err(|e| spawn_error(program, command_line, cwd, e))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        outcome => {
            log::warn!(
                "Killing '{}' (PID: {}) after {}s without exiting",
                command_line,
                child.id(),
                timeout.as_secs()
            );
            if let Err(e) = child.kill() {
                log::warn!("Failed to kill child process {}: {}", child.id(), e);
            }
            child.wait().ok();
            // Grandchildren can keep the pipes open long after the kill; the
            // readers are detached and finish whenever the last writer exits.
            drop(stdout_reader);
            drop(stderr_reader);
            return Err(match outcome {
                Err(e) => ExecutionError::CommandFailed(command_line.to_string(), e),
                Ok(_) => ExecutionError::TimedOut {
                    command: command_line.to_string(),
                    timeout,
                },
            });
        }
    };

    let stdout = join_reader(stdout_reader, command_line)?;
    let stderr = join_reader(stderr_reader, command_line)?;
    Ok((status, stdout, stderr))
}

fn drain(stream: Option<impl Read>) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        stream.read_to_end(&mut buffer)?;
    }
    Ok(buffer)
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<Vec<u8>>>,
    command_line: &str,
) -> Result<Vec<u8>, ExecutionError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output reader thread panicked")))
        .map_err(|e| ExecutionError::CommandFailed(command_line.to_string(), e))
}

/// Shell-style exit code: the process code, or 128 + signal number when killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}
