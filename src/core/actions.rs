// src/core/actions.rs

use crate::core::cache::CacheError;
use crate::core::state_machine::EnvironmentStateMachine;
use crate::models::Notification;
use crate::system::executor::{ExecutionError, ProcessOutput};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("'{command}' failed in '{}': {}", .directory.display(), .stderr.trim_end())]
    Rejected {
        command: &'static str,
        directory: PathBuf,
        stderr: String,
    },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// User-triggered commands. Each one delegates to the exporter and then
/// refreshes the state machine so the change takes effect immediately.
#[derive(Debug, Clone, Copy)]
pub struct CommandActions<'a> {
    machine: &'a EnvironmentStateMachine,
}

impl<'a> CommandActions<'a> {
    pub fn new(machine: &'a EnvironmentStateMachine) -> Self {
        Self { machine }
    }

    /// Approves the `.envrc` governing `path`, then reloads `path`.
    pub fn allow(&self, path: &Path) -> Result<(), ActionError> {
        let directory = target_directory(path);
        let output = self.machine.exporter().allow(&directory);
        self.finish("allow", path, directory, output)
    }

    /// Revokes approval of the `.envrc` governing `path`, then reloads `path`.
    pub fn deny(&self, path: &Path) -> Result<(), ActionError> {
        let directory = target_directory(path);
        let output = self.machine.exporter().deny(&directory);
        self.finish("deny", path, directory, output)
    }

    /// Drops every cached overlay, then recomputes the context of `path`.
    pub fn clear(&self, path: Option<&Path>) -> Result<(), ActionError> {
        self.machine.cache().clear()?;
        log::debug!("Overlay cache cleared");
        if path.is_some() {
            self.machine.push(path);
        }
        Ok(())
    }

    fn finish(
        &self,
        command: &'static str,
        path: &Path,
        directory: PathBuf,
        output: Result<ProcessOutput, ExecutionError>,
    ) -> Result<(), ActionError> {
        let output = match output {
            Ok(output) => output,
            Err(ExecutionError::NotFound(tool)) => {
                self.machine.notify(&Notification::ToolNotFound(tool.clone()));
                return Err(ExecutionError::NotFound(tool).into());
            }
            Err(e) => {
                self.machine.notify(&Notification::Error(e.to_string()));
                return Err(e.into());
            }
        };

        if !output.success() {
            self.machine.notify(&Notification::Error(output.stderr.clone()));
            return Err(ActionError::Rejected {
                command,
                directory,
                stderr: output.stderr,
            });
        }

        log::debug!("'{}' succeeded in '{}'", command, directory.display());
        self.machine.push(Some(path));
        Ok(())
    }
}

/// The directory the exporter runs in: `path` itself when it is a directory,
/// its parent otherwise.
fn target_directory(path: &Path) -> PathBuf {
    if path.is_dir() {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
