// src/system/env_store.rs

use crate::models::EnvMap;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Access to a mutable, process-wide environment.
///
/// The state machine only ever talks to this trait, so tests can run against a
/// private map instead of the real process environment.
pub trait EnvironmentStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn unset(&self, key: &str);
    /// Every variable that is valid UTF-8, sorted by name. Others are left to
    /// `executor::run_command`, which passes them through to child processes.
    fn snapshot(&self) -> EnvMap;
}

/// The environment of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentStore for ProcessEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    #[allow(unsafe_code)]
    fn set(&self, key: &str, value: &str) {
        // SAFETY: writes only happen on the state machine's single worker, and
        // std serialises them with its own readers (`Command`, `env::var`).
        unsafe { env::set_var(key, value) }
    }

    #[allow(unsafe_code)]
    fn unset(&self, key: &str) {
        // SAFETY: see `set`.
        unsafe { env::remove_var(key) }
    }

    fn snapshot(&self) -> EnvMap {
        env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

/// An isolated environment held in memory.
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    vars: Mutex<BTreeMap<String, String>>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from an existing snapshot.
    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Mutex::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EnvironmentStore for MemoryEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    fn unset(&self, key: &str) {
        self.lock().remove(key);
    }

    fn snapshot(&self) -> EnvMap {
        self.lock().clone()
    }
}
