// src/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A flat snapshot of environment variables, as handed to child processes.
pub type EnvMap = BTreeMap<String, String>;

// --- OVERLAYS ---

/// The variable changes attributed to one context root.
///
/// A `None` value is the "unset" marker: the variable must be removed from the
/// environment rather than set. The serialized form is the exporter's own JSON
/// shape (`{"KEY": "value", "GONE": null}`), which is also what the cache stores.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Overlay(BTreeMap<String, Option<String>>);

impl Overlay {
    /// Creates an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the stdout of `export json`, which is also the cache file
    /// format. Anything that is not a flat object
    /// of string-or-null values is rejected, and so is any entry the process
    /// environment cannot hold.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let overlay: Self = serde_json::from_str(text)?;
        overlay.validate()?;
        Ok(overlay)
    }

    /// Fails on the first entry that `set_var` would refuse: an empty name, a
    /// name containing `=` or NUL, or a value containing NUL.
    fn validate(&self) -> Result<(), serde_json::Error> {
        use serde::de::Error as _;

        for (key, value) in &self.0 {
            if key.is_empty() || key.contains(['=', '\0']) {
                return Err(serde_json::Error::custom(format!(
                    "invalid variable name {key:?}"
                )));
            }
            if value.as_deref().is_some_and(|v| v.contains('\0')) {
                return Err(serde_json::Error::custom(format!(
                    "value of {key:?} contains a NUL byte"
                )));
            }
        }
        Ok(())
    }

    /// Returns a new overlay where the entries of `newer` replace those of `self`.
    pub fn merged(&self, newer: &Self) -> Self {
        let mut entries = self.0.clone();
        entries.extend(newer.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(entries)
    }

    /// Returns a copy without the "unset" entries.
    pub fn live(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, v)| v.is_some())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Iterates over the variables that carry a value.
    pub fn live_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for Overlay {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        )
    }
}

// --- ROLLBACK ---

/// The value a variable had before an overlay touched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorValue {
    Present(String),
    Absent,
}

impl From<Option<String>> for PriorValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => Self::Present(v),
            None => Self::Absent,
        }
    }
}

/// The exact inverse of an applied overlay. Keys that are not present were
/// left untouched by the overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSet(BTreeMap<String, PriorValue>);

impl RollbackSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: impl Into<String>, prior: PriorValue) {
        self.0.insert(key.into(), prior);
    }

    pub fn get(&self, key: &str) -> Option<&PriorValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for RollbackSet {
    type Item = (String, PriorValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, PriorValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// --- STATE ---

/// Where the environment state machine currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContextState {
    /// No context loaded and nothing to roll back.
    #[default]
    Idle,
    /// An export for this directory is in flight.
    Loading(PathBuf),
    /// Steady state: `rollback` reverses what was applied for `directory`.
    Loaded {
        directory: PathBuf,
        rollback: RollbackSet,
    },
    /// The last export failed; the environment is back at its baseline.
    Failed { directory: PathBuf, reason: String },
}

// --- NOTIFICATIONS ---

/// Single-line, human readable events emitted towards the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Loading { directory: PathBuf, tick: String },
    Loaded(PathBuf),
    Unloaded(PathBuf),
    /// Raw stderr of the exporter, or a description of what went wrong.
    Error(String),
    ToolNotFound(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading { directory, tick } => {
                write!(f, "loading {} {}", directory.display(), tick)
            }
            Self::Loaded(directory) => write!(f, "loaded {}", directory.display()),
            Self::Unloaded(directory) => write!(f, "unloaded {}", directory.display()),
            Self::Error(message) => write!(f, "{}", message.trim_end()),
            Self::ToolNotFound(tool) => write!(
                f,
                "No {} executable found, {}",
                tool,
                crate::constants::INSTALL_HINT
            ),
        }
    }
}
