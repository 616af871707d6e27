//! In-Process Storage Module
//!
//! HashMap storage guarded by a RwLock, with lazy TTL expiration.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;

use crate::error::Result;
use crate::storage::{CacheEntry, StorageBackend};

// == Memory Backend ==
/// Ephemeral backend for single-process use. Entries are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Key-value storage
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    // == Length ==
    /// Returns the number of stored slots, including expired entries not yet swept.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        {
            let entries = self.read();
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it, unless a writer replaced it in between
        let mut entries = self.write();
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
        }
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>, expiration: Option<Duration>) -> Result<bool> {
        let entry = CacheEntry::new(value, expiration);
        self.write().insert(key.to_string(), entry);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<u64> {
        match self.write().remove(key) {
            Some(entry) if !entry.is_expired() => Ok(1),
            _ => Ok(0),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Utc::now();
        let mut keys: Vec<String> = self
            .read()
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
