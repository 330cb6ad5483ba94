// src/core/mod.rs

pub mod actions;
pub mod cache;
pub mod context_resolver;
pub mod overlay;
pub mod paths;
pub mod progress;
pub mod state_machine;
