//! Far-cache adapter contract: a thread-safe, shared key→string store with
//! the remote store's native TTL, optionally implementing the pub/sub
//! capability. The in-memory implementation here stands in for an actual
//! shared-store adapter (Redis and friends), which callers provide
//! themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::entry::Entry;
use crate::error::{CacheError, CacheResult};
use crate::pubsub::PubSub;

/// Contract over a thread-safe remote store with the usable-horizon TTL.
///
/// Identical in shape to [`crate::near::NearCache`] except `set` stores
/// with TTL equal to `expired_at - now` (the full usable horizon), and an
/// adapter may additionally implement [`PubSub`] — surfaced through
/// [`FarCache::as_pubsub`] since Rust traits have no structural capability
/// check; an adapter opts in explicitly by overriding the method.
#[async_trait]
pub trait FarCache<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &str) -> CacheResult<Option<Entry<T>>>;
    async fn set(&self, key: &str, entry: &Entry<T>) -> CacheResult<()>;
    async fn del(&self, key: &str) -> CacheResult<()>;
    async fn close(&self);

    /// Returns this adapter's pub/sub capability, if implemented. Defaults
    /// to `None`.
    fn as_pubsub(&self) -> Option<&dyn PubSub> {
        None
    }
}

struct StoredBytes {
    bytes: Vec<u8>,
}

/// `DashMap`-backed reference far-cache implementation.
pub struct InMemoryFarCache {
    storage: DashMap<String, StoredBytes>,
    closed: AtomicBool,
    pubsub: Option<Arc<dyn PubSub>>,
}

impl InMemoryFarCache {
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
            closed: AtomicBool::new(false),
            pubsub: None,
        }
    }

    /// Builds a far cache that also exposes `pubsub` as its pub/sub
    /// capability.
    pub fn with_pubsub(pubsub: Arc<dyn PubSub>) -> Self {
        Self {
            storage: DashMap::new(),
            closed: AtomicBool::new(false),
            pubsub: Some(pubsub),
        }
    }
}

impl Default for InMemoryFarCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> FarCache<T> for InMemoryFarCache
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &str) -> CacheResult<Option<Entry<T>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::OutStorageClosed);
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
            return Err(CacheError::OutStorageClosed);
        }
        let bytes = codec::encode(entry)?;
        self.storage.insert(key.to_string(), StoredBytes { bytes });
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::OutStorageClosed);
        }
        self.storage.remove(key);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn as_pubsub(&self) -> Option<&dyn PubSub> {
        self.pubsub.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::now_unix;

    #[tokio::test]
    async fn miss_returns_none_without_error() {
        let far = InMemoryFarCache::new();
        let got: Option<Entry<String>> = FarCache::<String>::get(&far, "missing").await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let far = InMemoryFarCache::new();
        let entry = Entry::new(42i32, 30, 32, now_unix());
        FarCache::<i32>::set(&far, "k", &entry).await.unwrap();
        let got = FarCache::<i32>::get(&far, "k").await.unwrap().unwrap();
        assert_eq!(got.value, 42);
    }

    #[tokio::test]
    async fn without_pubsub_capability_is_none() {
        let far = InMemoryFarCache::new();
        assert!(far.as_pubsub().is_none());
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let far = InMemoryFarCache::new();
        FarCache::<i32>::close(&far).await;
        let err = FarCache::<i32>::get(&far, "k").await.unwrap_err();
        assert!(matches!(err, CacheError::OutStorageClosed));
    }
}
