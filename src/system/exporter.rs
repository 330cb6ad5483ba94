// src/system/exporter.rs

use crate::constants::DEFAULT_EXPORTER;
use crate::models::EnvMap;
use crate::system::executor::{self, ExecutionError, ProcessOutput};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// The external tool that computes a context root's variables and manages its
/// allow list. Every call blocks until the tool exits.
pub trait Exporter: Send + Sync + fmt::Debug {
    /// Runs `export json` in `directory` with exactly `env` as its environment.
    fn export(&self, directory: &Path, env: &EnvMap) -> Result<ProcessOutput, ExecutionError>;
    fn allow(&self, directory: &Path) -> Result<ProcessOutput, ExecutionError>;
    fn deny(&self, directory: &Path) -> Result<ProcessOutput, ExecutionError>;
    /// Whether the tool can currently be found.
    fn is_available(&self) -> bool;
    /// Name used in user-facing reports.
    fn name(&self) -> &str;
}

/// `direnv` (or a wrapper around it) driven as a subprocess.
#[derive(Debug, Clone)]
pub struct DirenvExporter {
    prefix: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for DirenvExporter {
    fn default() -> Self {
        Self {
            prefix: vec![DEFAULT_EXPORTER.to_string()],
            timeout: None,
        }
    }
}

impl DirenvExporter {
    /// Builds an exporter from a command line such as `direnv` or
    /// `nix run nixpkgs#direnv --`.
    pub fn from_command_line(command_line: &str) -> Result<Self, ExecutionError> {
        let prefix = shlex::split(command_line).unwrap_or_default();
        if prefix.is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }
        Ok(Self {
            prefix,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn argv(&self, subcommand: &[&str]) -> Vec<String> {
        self.prefix
            .iter()
            .cloned()
            .chain(subcommand.iter().map(|s| s.to_string()))
            .collect()
    }
}

impl Exporter for DirenvExporter {
    fn export(&self, directory: &Path, env: &EnvMap) -> Result<ProcessOutput, ExecutionError> {
        executor::run_command(&self.argv(&["export", "json"]), directory, Some(env), self.timeout)
    }

    fn allow(&self, directory: &Path) -> Result<ProcessOutput, ExecutionError> {
        executor::run_command(&self.argv(&["allow"]), directory, None, self.timeout)
    }

    fn deny(&self, directory: &Path) -> Result<ProcessOutput, ExecutionError> {
        executor::run_command(&self.argv(&["deny"]), directory, None, self.timeout)
    }

    fn is_available(&self) -> bool {
        self.prefix
            .first()
            .is_some_and(|program| which::which(program).is_ok())
    }

    fn name(&self) -> &str {
        self.prefix.first().map(String::as_str).unwrap_or(DEFAULT_EXPORTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_line_is_split_like_a_shell() {
        let exporter = DirenvExporter::from_command_line("nix run 'nixpkgs#direnv' --").unwrap();
        assert_eq!(
            exporter.argv(&["export", "json"]),
            vec!["nix", "run", "nixpkgs#direnv", "--", "export", "json"]
        );
        assert_eq!(exporter.name(), "nix");
    }

    #[test]
    fn test_blank_command_line_is_rejected() {
        assert!(matches!(
            DirenvExporter::from_command_line("   "),
            Err(ExecutionError::EmptyCommand)
        ));
        assert!(matches!(
            DirenvExporter::from_command_line("\"unterminated"),
            Err(ExecutionError::EmptyCommand)
        ));
    }

    #[test]
    fn test_missing_tool_is_unavailable_and_fails_to_run() {
        let dir = TempDir::new().unwrap();
        let exporter = DirenvExporter::from_command_line("envsync-missing-direnv").unwrap();

        assert!(!exporter.is_available());
        assert!(matches!(
            exporter.allow(dir.path()),
            Err(ExecutionError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_export_passes_subcommand_and_environment() {
        let dir = TempDir::new().unwrap();
        // `sh -c '<script>' export json` exposes the subcommand as $0 and $1.
        let exporter = DirenvExporter::from_command_line(
            r#"sh -c 'printf "{\"ARGS\":\"%s %s\",\"SEEN\":\"%s\"}" "$0" "$1" "$INPUT"'"#,
        )
        .unwrap();
        let mut env = EnvMap::new();
        env.insert("PATH".into(), std::env::var("PATH").unwrap_or_default());
        env.insert("INPUT".into(), "from-cache".into());

        let output = exporter.export(dir.path(), &env).unwrap();

        assert!(output.success());
        assert_eq!(
            output.stdout,
            r#"{"ARGS":"export json","SEEN":"from-cache"}"#
        );
    }
}
