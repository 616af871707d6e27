//! Storage Module
//!
//! The key-value contract memoized results are kept behind, and its two implementations.

mod entry;
mod memory;
mod redis;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{BackendKind, Config};
use crate::error::Result;

// Re-export public types
pub use self::redis::RedisBackend;
pub use entry::CacheEntry;
pub use memory::MemoryBackend;

// == Storage Backend ==
/// Capability contract every storage backend implements.
///
/// All implementations share the same expiration semantics: an entry past its expiry is
/// absent for every operation, whether or not it has physically been removed yet.
pub trait StorageBackend: Send + Sync + Debug {
    /// Returns the stored bytes, or None if the key was never set, was deleted, or expired.
    ///
    /// Reading a live entry never changes its expiry.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// `None` or a zero expiration means the entry never expires.
    fn set(&self, key: &str, value: Vec<u8>, expiration: Option<Duration>) -> Result<bool>;

    /// Removes a live entry and returns 1, or returns 0 if it was absent or already expired.
    fn delete(&self, key: &str) -> Result<u64>;

    /// Returns every live key that starts with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Opens the backend selected by `config`.
///
/// The network backend connects eagerly and fails here if the store is unreachable.
pub fn open_backend(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    match config.backend {
        BackendKind::InProcess => {
            info!("Using in-process storage backend");
            Ok(Arc::new(MemoryBackend::new()))
        }
        BackendKind::Network => {
            let backend = RedisBackend::connect(&config.redis)?;
            Ok(Arc::new(backend))
        }
    }
}
