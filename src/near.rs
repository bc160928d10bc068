//! Near-cache adapter contract: a thread-safe, in-process key→bytes store
//! with per-entry TTL. The core only requires the trait; a `DashMap`-backed
//! reference implementation is provided, standing in for an in-process
//! store such as an LRU or sharded freelist cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::codec;
use crate::entry::{now_unix, Entry};
use crate::error::{CacheError, CacheResult};

/// Contract over a thread-safe local byte store with per-entry TTL.
///
/// Implementations must be safe for concurrent use (`Send + Sync`).
/// `get` returns `found = false` with no error when the key is absent.
#[async_trait]
pub trait NearCache<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Reads the entry stored for `key`, if any and not closed.
    async fn get(&self, key: &str) -> CacheResult<Option<Entry<T>>>;

    /// Serializes and stores `entry` with TTL set to
    /// `entry.obsolete_at - now` seconds, so the store itself evicts stale
    /// entries; the coordinator still checks freshness on read.
    async fn set(&self, key: &str, entry: &Entry<T>) -> CacheResult<()>;

    /// Removes `key`, if present.
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Closes the adapter. Subsequent operations return
    /// [`CacheError::LocalStorageClosed`].
    async fn close(&self);
}

struct StoredBytes {
    bytes: Vec<u8>,
    expires_at: i64,
}

/// `DashMap`-backed reference near-cache implementation. Stored bytes are
/// the JSON encoding of `Entry<T>`. A background task periodically scans
/// and evicts entries whose TTL has lapsed.
pub struct InMemoryNearCache {
    storage: Arc<DashMap<String, StoredBytes>>,
    closed: Arc<AtomicBool>,
    gc_handle: Option<JoinHandle<()>>,
}

impl InMemoryNearCache {
    /// Builds a store with a background GC tick every `gc_interval`.
    pub fn new(gc_interval: Duration) -> Self {
        let storage: Arc<DashMap<String, StoredBytes>> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        let gc_storage = storage.clone();
        let gc_closed = closed.clone();
        let gc_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gc_interval);
            loop {
                ticker.tick().await;
                if gc_closed.load(Ordering::Acquire) {
                    return;
                }
                let now = now_unix();
                gc_storage.retain(|_, v| v.expires_at > now);
            }
        });

        Self {
            storage,
            closed,
            gc_handle: Some(gc_handle),
        }
    }
}

impl Default for InMemoryNearCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Drop for InMemoryNearCache {
    fn drop(&mut self) {
        if let Some(h) = self.gc_handle.take() {
            h.abort();
        }
    }
}

#[async_trait]
impl<T> NearCache<T> for InMemoryNearCache
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &str) -> CacheResult<Option<Entry<T>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::LocalStorageClosed);
        }
        match self.storage.get(key) {
            Some(stored) => {
                let entry: Entry<T> = codec::decode(&stored.bytes)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: &Entry<T>) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::LocalStorageClosed);
        }
        let bytes = codec::encode(entry)?;
        self.storage.insert(
            key.to_string(),
            StoredBytes {
                bytes,
                expires_at: entry.obsolete_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::LocalStorageClosed);
        }
        self.storage.remove(key);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_returns_none_without_error() {
        let near = InMemoryNearCache::new(Duration::from_secs(60));
        let got: Option<Entry<String>> = near.get("missing").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let near = InMemoryNearCache::new(Duration::from_secs(60));
        let entry = Entry::new("value".to_string(), 30, 32, now_unix());
        near.set("k", &entry).await.unwrap();
        let got = near.get("k").await.unwrap().unwrap();
        assert_eq!(got.value, "value");
    }

    #[tokio::test]
    async fn del_removes_entry() {
        let near = InMemoryNearCache::new(Duration::from_secs(60));
        let entry = Entry::new(1i32, 30, 32, now_unix());
        near.set("k", &entry).await.unwrap();
        near.del("k").await.unwrap();
        let got: Option<Entry<i32>> = near.get("k").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let near = InMemoryNearCache::new(Duration::from_secs(60));
        NearCache::<i32>::close(&near).await;
        let err = NearCache::<i32>::get(&near, "k").await.unwrap_err();
        assert!(matches!(err, CacheError::LocalStorageClosed));
    }
}
