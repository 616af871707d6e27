//! Memoizit - Function-result memoization over pluggable storage
//!
//! Caches serialized return values keyed by function name and argument digests, with
//! TTL expiry and prefix-based invalidation, in-process or in Redis.

pub mod config;
pub mod error;
pub mod memoize;
pub mod storage;
pub mod tasks;

pub use config::{BackendKind, Config, RedisConfig};
pub use error::{CacheError, Result};
pub use memoize::{ArgumentMap, CallArgs, MemoizeOptions, Memoized, Memoizer, Signature};
pub use storage::{open_backend, MemoryBackend, RedisBackend, StorageBackend};
pub use tasks::{spawn_cleanup_task, spawn_configured_cleanup};
