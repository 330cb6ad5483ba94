// src/core/cache.rs

use crate::constants::CACHE_FILE_EXTENSION;
use crate::models::Overlay;
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;
use walkdir::WalkDir;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cache entry '{path}' is not a valid overlay: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize overlay: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to move cache entry into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

type CacheResult<T> = Result<T, CacheError>;

/// A persisted entry as seen when listing the cache root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub file_name: String,
    pub variables: usize,
}

/// Per-directory overlays, memoized in memory and persisted as one JSON file
/// per context root.
#[derive(Debug)]
pub struct EnvironmentCache {
    root: PathBuf,
    memory: Mutex<HashMap<PathBuf, Overlay>>,
}

impl EnvironmentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the storage file for `directory`: a truncated blake3 hash of its
    /// path plus its base name, e.g. `3f9c...e1-myproject.cache`.
    pub fn entry_path(&self, directory: &Path) -> PathBuf {
        let hash = blake3::hash(directory.as_os_str().as_encoded_bytes());
        let digest = hex::encode(hash.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or_default());
        let readable = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        self.root
            .join(format!("{}-{}.{}", digest, readable, CACHE_FILE_EXTENSION))
    }

    /// Returns the live entries cached for `directory` ("unset" markers are
    /// filtered out), or an empty overlay when nothing was ever stored.
    pub fn get(&self, directory: &Path) -> CacheResult<Overlay> {
        let path = self.entry_path(directory);
        let mut memory = self.lock();
        if let Some(overlay) = memory.get(&path) {
            return Ok(overlay.live());
        }

        let overlay = match fs::read_to_string(&path) {
            Ok(content) => Overlay::from_json(&content).map_err(|source| {
                CacheError::Decode {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Overlay::new()),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        debug!("Loaded {} cached variables from '{}'", overlay.len(), path.display());

        let live = overlay.live();
        memory.insert(path, overlay);
        Ok(live)
    }

    /// Replaces the entry for `directory`.
    ///
    /// The in-memory tier is updated first, so the session keeps working even
    /// when the disk write fails. On disk the file is swapped in atomically.
    pub fn set(&self, directory: &Path, overlay: &Overlay) -> CacheResult<()> {
        let path = self.entry_path(directory);
        self.lock().insert(path.clone(), overlay.clone());

        fs::create_dir_all(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;
        let payload = serde_json::to_vec(overlay)?;
        let mut staging = NamedTempFile::new_in(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;
        staging
            .write_all(&payload)
            .map_err(|source| CacheError::Io {
                path: staging.path().to_path_buf(),
                source,
            })?;
        staging.persist(&path)?;

        debug!("Persisted {} variables to '{}'", overlay.len(), path.display());
        Ok(())
    }

    /// Deletes every persisted entry and forgets the in-memory index. A cache
    /// root that does not exist is already clear.
    pub fn clear(&self) -> CacheResult<()> {
        self.lock().clear();
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                debug!("Cleared cache root '{}'", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.root.clone(),
                source,
            }),
        }
    }

    /// Lists the persisted entries, sorted by file name.
    pub fn entries(&self) -> CacheResult<Vec<CacheEntryInfo>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.root.clone(),
                source: e.into(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CACHE_FILE_EXTENSION) {
                continue;
            }
            let content = fs::read_to_string(path).map_err(|source| CacheError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let overlay =
                Overlay::from_json(&content).map_err(|source| CacheError::Decode {
                    path: path.to_path_buf(),
                    source,
                })?;
            entries.push(CacheEntryInfo {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                variables: overlay.live().len(),
            });
        }
        Ok(entries)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Overlay>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
