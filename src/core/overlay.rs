// src/core/overlay.rs

//! The two phases of every context switch, kept as plain functions over an
//! `EnvironmentStore` so each can be tested on its own:
//!
//! 1. `restore` puts back what the previous overlay changed.
//! 2. `apply_overlay` writes the next overlay and returns the `RollbackSet`
//!    that undoes it (computed by `compute_rollback` before any write).
//!    `write_overlay` is the write half on its own.
//!
//! Only the state machine composes them, always restore first.

use crate::models::{EnvMap, Overlay, PriorValue, RollbackSet};
use crate::system::env_store::EnvironmentStore;

/// Whether `key` is exporter metadata, which is never applied nor rolled back.
pub fn is_metadata_key(key: &str, metadata_prefix: &str) -> bool {
    !metadata_prefix.is_empty() && key.starts_with(metadata_prefix)
}

/// Computes which variables `overlay` would change in `store`, with the value
/// each had beforehand. Reads only.
pub fn compute_rollback(
    store: &dyn EnvironmentStore,
    overlay: &Overlay,
    metadata_prefix: &str,
) -> RollbackSet {
    let mut rollback = RollbackSet::new();
    for (key, wanted) in overlay.iter() {
        if is_metadata_key(key, metadata_prefix) {
            continue;
        }
        let current = store.get(key);
        if current != *wanted {
            rollback.record(key.clone(), PriorValue::from(current));
        }
    }
    rollback
}

/// Applies `overlay` to `store`: values are set, "unset" markers remove the
/// variable. Returns the exact inverse of what was written.
pub fn apply_overlay(
    store: &dyn EnvironmentStore,
    overlay: &Overlay,
    metadata_prefix: &str,
) -> RollbackSet {
    let rollback = compute_rollback(store, overlay, metadata_prefix);
    write_overlay(store, overlay, &rollback);
    rollback
}

/// Writes the variables of `overlay` recorded in `rollback`, which must come
/// from `compute_rollback` on the same overlay and store.
pub fn write_overlay(store: &dyn EnvironmentStore, overlay: &Overlay, rollback: &RollbackSet) {
    for key in rollback.keys() {
        match overlay.get(key) {
            Some(Some(value)) => store.set(key, value),
            Some(None) => store.unset(key),
            None => {}
        }
    }
    log::debug!("Applied {} variable changes", rollback.len());
}

/// Reverts the changes recorded in `rollback`.
pub fn restore(store: &dyn EnvironmentStore, rollback: RollbackSet) {
    if rollback.is_empty() {
        return;
    }
    log::debug!("Rolling back {} variables", rollback.len());
    for (key, prior) in rollback {
        match prior {
            PriorValue::Present(value) => store.set(&key, &value),
            PriorValue::Absent => store.unset(&key),
        }
    }
}

/// The environment handed to the exporter: the live environment with the
/// cached overlay on top, so earlier exports are visible to the tool itself.
pub fn merge_environment(live: EnvMap, cached: &Overlay) -> EnvMap {
    let mut merged = live;
    merged.extend(cached.live_values().map(|(k, v)| (k.to_string(), v.to_string())));
    merged
}

/// The overlay that turns `before` into `after`: changed or added variables
/// carry their new value, removed ones the "unset" marker.
pub fn diff_environments(before: &EnvMap, after: &EnvMap) -> Overlay {
    let changed = after
        .iter()
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| (key.as_str(), Some(value.as_str())));
    let removed = before
        .keys()
        .filter(|key| !after.contains_key(*key))
        .map(|key| (key.as_str(), None));
    changed.chain(removed).collect()
}
