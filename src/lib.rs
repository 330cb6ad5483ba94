//! # envsync
//!
//! Keeps a long-lived process environment in sync with the `.envrc` of the
//! directory currently being worked in. Each context change runs the
//! exporter (`direnv export json`) on a background worker, rolls back the
//! previous overlay and applies the new one.
//!
//! The library is host-agnostic: hosts feed paths into
//! [`core::state_machine::EnvironmentStateMachine::push`] and receive
//! [`models::Notification`]s through a sink. The `envsync` binary is one such
//! host.

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;

#[cfg(test)]
mod test_support;
