// src/cli/handlers/mod.rs

// One module per CLI action.

pub mod approval;
pub mod cache;
pub mod commons;
pub mod exec;
pub mod export;
pub mod load;
