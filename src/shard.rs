//! Fingerprinted sharded-lock manager that coalesces concurrent origin
//! loads for the same key into a single call per instance.
//!
//! A global lock would serialize unrelated keys; a per-key lock would grow
//! unboundedly. A fixed-width array of mutexes, indexed by a hash of the
//! key, bounds contention while still guaranteeing that no two origin loads
//! for the same key run concurrently on the same instance. Cross-instance
//! single-flight is explicitly not guaranteed — see the far-side lease
//! open question in DESIGN.md.

use tokio::sync::{Mutex, MutexGuard};

use crate::hash::fnv1a64;

/// Fixed-width array of mutexes used to serialize origin loads per key.
pub struct ShardManager {
    shards: Vec<Mutex<()>>,
    mask: u64,
}

impl ShardManager {
    /// Builds a shard manager with `count` shards. `count` must be a power
    /// of two so `hash & (count - 1)` maps uniformly.
    ///
    /// # Panics
    /// Panics if `count` is zero or not a power of two.
    pub fn new(count: usize) -> Self {
        assert!(count > 0 && count.is_power_of_two(), "shard count must be a nonzero power of two");
        let shards = (0..count).map(|_| Mutex::new(())).collect();
        Self {
            shards,
            mask: (count - 1) as u64,
        }
    }

    fn slot(&self, key: &str) -> usize {
        (fnv1a64(key) & self.mask) as usize
    }

    /// Acquires the shard lock guarding `key`. Ordering among competing
    /// loaders within a slot is whatever the mutex provides; callers need
    /// only that no two origin loads for the same key run concurrently.
    pub async fn acquire(&self, key: &str) -> MutexGuard<'_, ()> {
        self.shards[self.slot(key)].lock().await
    }
}

impl Default for ShardManager {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    #[should_panic]
    fn rejects_non_power_of_two() {
        ShardManager::new(3);
    }

    #[tokio::test]
    async fn same_key_serializes_concurrent_loaders() {
        let mgr = Arc::new(ShardManager::new(4));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let mgr = mgr.clone();
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _guard = mgr.acquire("same-key").await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_can_run_concurrently() {
        let mgr = Arc::new(ShardManager::new(256));
        let g1 = mgr.acquire("key-a").await;
        let g2 = mgr.acquire("key-b").await;
        drop(g1);
        drop(g2);
    }
}
