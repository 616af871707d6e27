//! TTL Cleanup Task
//!
//! Background task that periodically removes expired entries from the in-process backend.
//! Expired entries are already invisible to readers; the sweep only reclaims memory.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::storage::MemoryBackend;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs until aborted, sleeping for `cleanup_interval_secs` between sweeps.
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```ignore
/// let backend = Arc::new(MemoryBackend::new());
/// let cleanup_handle = spawn_cleanup_task(backend.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    backend: Arc<MemoryBackend>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = backend.cleanup_expired();

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

/// Spawns the sweep at `config.cleanup_interval`, or nothing if the interval is 0.
pub fn spawn_configured_cleanup(
    backend: Arc<MemoryBackend>,
    config: &Config,
) -> Option<JoinHandle<()>> {
    if config.cleanup_interval == 0 {
        debug!("TTL cleanup disabled; expired entries are dropped on access");
        return None;
    }
    Some(spawn_cleanup_task(backend, config.cleanup_interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageBackend;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set("expire_soon", b"value".to_vec(), Some(Duration::from_millis(200)))
            .unwrap();

        let handle = spawn_cleanup_task(backend.clone(), 1);

        // Wait for entry to expire and one sweep to run
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Swept without any read touching it
        assert!(backend.is_empty(), "Expired entry should have been cleaned up");

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set("long_lived", b"value".to_vec(), Some(Duration::from_secs(3600)))
            .unwrap();
        backend.set("forever", b"value".to_vec(), None).unwrap();

        let handle = spawn_cleanup_task(backend.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get("long_lived").unwrap(), Some(b"value".to_vec()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_configured_cleanup_respects_interval() {
        let backend = Arc::new(MemoryBackend::new());

        let disabled = spawn_configured_cleanup(backend.clone(), &Config::default());
        assert!(disabled.is_none());

        let config = Config {
            cleanup_interval: 1,
            ..Config::default()
        };
        let handle = spawn_configured_cleanup(backend, &config).unwrap();
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let backend = Arc::new(MemoryBackend::new());

        let handle = spawn_cleanup_task(backend, 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
