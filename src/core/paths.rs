// src/core/paths.rs

use crate::constants::{APP_DIR_NAME, CONFIG_FILENAME, CONFIG_PATH_ENV};
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

lazy_static! {
    static ref DEFAULT_CACHE_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not find system cache directory.")]
    CacheDirNotFound,
    #[error("Failed to expand path template '{template}': {reason}")]
    Expansion { template: String, reason: String },
}

/// Returns the path of the settings file: `$ENVSYNC_CONFIG` when set,
/// `~/.config/envsync/config.toml` otherwise.
pub fn get_config_path() -> Result<PathBuf, PathError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILENAME))
        .ok_or(PathError::ConfigDirNotFound)
}

/// Returns the default cache root (`~/.cache/envsync` on Linux).
///
/// Memoized: only the first call asks the platform. The directory is not
/// created here; the cache creates it on first write.
pub fn get_default_cache_dir() -> Result<PathBuf, PathError> {
    let mut cached = DEFAULT_CACHE_DIR
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let cache_path = dirs::cache_dir()
        .ok_or(PathError::CacheDirNotFound)?
        .join(APP_DIR_NAME);
    *cached = Some(cache_path.clone());
    Ok(cache_path)
}

/// Expands `~` and `$VAR`/`${VAR}` in a user supplied path.
pub fn expand_path_template(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Resolves the cache root: the configured template if any, the platform
/// default otherwise.
pub fn resolve_cache_dir(template: Option<&str>) -> Result<PathBuf, PathError> {
    match template {
        Some(template) => expand_path_template(template),
        None => get_default_cache_dir(),
    }
}
