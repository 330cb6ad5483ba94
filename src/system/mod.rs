//! # System Interaction Layer
//!
//! Everything that touches the operating system lives here, behind small
//! interfaces the core logic can be tested against.
//!
//! ## Modules
//!
//! - **`executor`**: spawns one external process, waits for it, drains both output
//!   streams and strips terminal escapes from stderr.
//! - **`exporter`**: the `Exporter` seam and its `direnv` implementation
//!   (`export json`, `allow`, `deny`).
//! - **`env_store`**: the `EnvironmentStore` abstraction over the process-wide
//!   environment, with an in-memory variant.

pub mod env_store;
pub mod executor;
pub mod exporter;
