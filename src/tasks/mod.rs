//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: Sweeps expired entries from the in-process backend at a fixed interval

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_configured_cleanup};
