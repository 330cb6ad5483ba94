// src/config.rs

//! User settings, read from `config.toml`.
//!
//! Every field is optional in the file; a missing file is the same as an
//! empty one.

use crate::constants::{DEFAULT_EXPORTER, DEFAULT_METADATA_PREFIX, DEFAULT_TICK_INTERVAL_MS};
use crate::core::paths::{self, PathError};
use crate::core::state_machine::MachineOptions;
use crate::system::executor::ExecutionError;
use crate::system::exporter::DirenvExporter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Failed to read settings file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse settings file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid exporter command '{command}': {source}")]
    Exporter {
        command: String,
        #[source]
        source: ExecutionError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Command prefix of the exporter, e.g. `direnv` or `nix run nixpkgs#direnv --`.
    pub exporter: String,
    /// Cache root template. `~` and `$VAR` are expanded.
    pub cache_dir: Option<String>,
    pub tick_interval_ms: u64,
    pub metadata_prefix: String,
    /// Kill the exporter after this many seconds. No limit when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exporter: DEFAULT_EXPORTER.to_string(),
            cache_dir: None,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn build_exporter(&self) -> Result<DirenvExporter, ConfigError> {
        let exporter =
            DirenvExporter::from_command_line(&self.exporter).map_err(|source| ConfigError::Exporter {
                command: self.exporter.clone(),
                source,
            })?;
        Ok(exporter.with_timeout(self.timeout_secs.map(Duration::from_secs)))
    }

    pub fn cache_root(&self) -> Result<PathBuf, ConfigError> {
        Ok(paths::resolve_cache_dir(self.cache_dir.as_deref())?)
    }

    pub fn machine_options(&self) -> MachineOptions {
        MachineOptions {
            metadata_prefix: self.metadata_prefix.clone(),
            tick_interval: Duration::from_millis(self.tick_interval_ms),
        }
    }
}

/// Loads settings from `path`, or from the default location when `None`.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => paths::get_config_path()?,
    };

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("No settings file at '{}', using defaults", path.display());
            return Ok(Settings::default());
        }
        Err(source) => return Err(ConfigError::Read { path, source }),
    };

    let settings = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    log::debug!("Loaded settings from '{}'", path.display());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "exporter = \"nix run nixpkgs#direnv --\"\ntimeout_secs = 30\ncache_dir = \"/tmp/envsync-test\"\n",
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();

        assert_eq!(settings.exporter, "nix run nixpkgs#direnv --");
        assert_eq!(settings.timeout_secs, Some(30));
        assert_eq!(settings.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
        assert_eq!(settings.metadata_prefix, DEFAULT_METADATA_PREFIX);
        assert_eq!(settings.cache_root().unwrap(), PathBuf::from("/tmp/envsync-test"));
    }

    #[test]
    fn test_unknown_key_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "exportr = \"direnv\"\n").unwrap();

        assert!(matches!(load_settings(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_blank_exporter_is_rejected() {
        let settings = Settings {
            exporter: "   ".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.build_exporter(),
            Err(ConfigError::Exporter { .. })
        ));
    }

    #[test]
    fn test_machine_options_follow_settings() {
        let settings = Settings {
            tick_interval_ms: 15,
            metadata_prefix: "X_".to_string(),
            ..Settings::default()
        };
        let options = settings.machine_options();
        assert_eq!(options.tick_interval, Duration::from_millis(15));
        assert_eq!(options.metadata_prefix, "X_");
    }
}
