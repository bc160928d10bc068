//! The top-level coordination engine: Get/Set/Del state machines wiring
//! together the shard manager, worker pool, near/far adapters, pub/sub
//! subscriber, hit statistics, and the optional monitor.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::entry::{now_unix, Entry};
use crate::error::{CacheError, CacheResult};
use crate::far::{FarCache, InMemoryFarCache};
use crate::monitor;
use crate::near::{InMemoryNearCache, NearCache};
use crate::pubsub::{Action, ChannelMessage};
use crate::shard::ShardManager;
use crate::stats::{HitStatistics, HitStatisticsSnapshot};
use crate::{pool::Pool, subscriber};

/// Loads a fresh value for `key` from the origin system. Errors propagate
/// to the caller; `Ok(None)` means the origin has nothing for this key.
pub type Loader<T> = Box<
    dyn Fn(&str) -> Pin<Box<dyn Future<Output = CacheResult<Option<T>>> + Send>> + Send + Sync,
>;

/// Two-tier cache coordinator: near cache, far cache, origin loader, under
/// single-flight shard locks, with cross-instance invalidation over
/// pub/sub.
pub struct Coordinator<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    gid: Uuid,
    config: CacheConfig,
    near: Arc<dyn NearCache<T>>,
    far: Arc<dyn FarCache<T>>,
    shards: Arc<ShardManager>,
    pool: Arc<Pool>,
    stats: Arc<HitStatistics>,
    closed: AtomicBool,
    subscriber_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    monitor_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<T> Coordinator<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Builds a coordinator with default configuration. `far`/`near` default
    /// to the in-memory reference adapters when omitted.
    pub fn new(
        far: Option<Arc<dyn FarCache<T>>>,
        near: Option<Arc<dyn NearCache<T>>>,
    ) -> CacheResult<Self> {
        Self::with_config(far, near, CacheConfig::default())
    }

    /// Builds a coordinator with explicit tunables, starting the worker
    /// pool, the subscriber loop (if the far adapter implements pub/sub and
    /// `config.pubsub_enabled`), and the monitor (if `config.monitor_enabled`).
    /// `far`/`near` default to the in-memory reference adapters when omitted.
    ///
    /// Returns [`CacheError::CacheNotImplementPubSub`] if `config.pubsub_enabled`
    /// is set but the resulting far adapter does not implement [`crate::pubsub::PubSub`].
    pub fn with_config(
        far: Option<Arc<dyn FarCache<T>>>,
        near: Option<Arc<dyn NearCache<T>>>,
        config: CacheConfig,
    ) -> CacheResult<Self> {
        let far: Arc<dyn FarCache<T>> = far.unwrap_or_else(|| Arc::new(InMemoryFarCache::new()));
        let near: Arc<dyn NearCache<T>> =
            near.unwrap_or_else(|| Arc::new(InMemoryNearCache::default()));

        let gid = Uuid::new_v4();
        let pool = Pool::new(config.pool_workers, config.pool_queue_len);
        let stats = Arc::new(HitStatistics::new());
        let shards = Arc::new(ShardManager::new(config.shard_count));

        let subscriber_handle = if config.pubsub_enabled {
            let pubsub = far
                .as_pubsub()
                .ok_or(CacheError::CacheNotImplementPubSub)?;
            let receiver = pubsub.subscribe();
            Some(subscriber::spawn(
                gid,
                receiver,
                near.clone(),
                far.clone(),
                pool.clone(),
            ))
        } else {
            None
        };

        let monitor_handle = if config.monitor_enabled {
            Some(monitor::spawn(
                stats.clone(),
                std::time::Duration::from_secs(config.monitor_seconds),
            ))
        } else {
            None
        };

        Ok(Self {
            gid,
            config,
            near,
            far,
            shards,
            pool,
            stats,
            closed: AtomicBool::new(false),
            subscriber_handle: Mutex::new(subscriber_handle),
            monitor_handle: Mutex::new(monitor_handle),
        })
    }

    /// This instance's pub/sub identity, used to suppress self-echoes.
    pub fn gid(&self) -> Uuid {
        self.gid
    }

    /// A point-in-time snapshot of hit counters and derived ratios.
    pub fn stats(&self) -> HitStatisticsSnapshot {
        self.stats.snapshot()
    }

    fn check_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::CacheClosed);
        }
        Ok(())
    }

    /// Read-through Get: near → far → origin, under a per-key shard lock on
    /// the origin path. `ttl_seconds <= 0` is coerced to the configured
    /// floor. See the module-level state machine description.
    pub async fn get(&self, key: &str, ttl_seconds: i64, loader: &Arc<Loader<T>>) -> CacheResult<T> {
        self.check_open()?;
        if key.is_empty() {
            return Err(CacheError::CacheKeyEmpty);
        }
        let ttl_seconds = CacheConfig::normalize_ttl(ttl_seconds);

        self.stats.record_get();

        // 1. Near lookup.
        if let Some(entry) = self.near.get(key).await? {
            let now = now_unix();
            if !entry.obsoleted(now) {
                self.stats.record_near_hit();
                self.debug_hit("near", key);
                return Ok(entry.value);
            }
            self.stats.record_near_hit();
            self.debug_hit("near-obsolete", key);
            let value = entry.value.clone();
            self.schedule_sync_near(key.to_string(), loader.clone(), ttl_seconds);
            return Ok(value);
        }

        // 2. Far lookup.
        if let Some(entry) = self.far.get(key).await? {
            let now = now_unix();
            if !entry.expired(now) {
                self.stats.record_far_hit();
                self.debug_hit("far", key);
                self.near.set(key, &entry).await?;
                return Ok(entry.value);
            }
        }

        // 3. Origin load, single-flighted per key on this instance.
        let _guard = self.shards.acquire(key).await;
        self.stats.record_origin_hit();
        self.debug_hit("origin", key);

        let loaded = loader(key).await?;
        let Some(value) = loaded else {
            return Err(CacheError::DataSourceLoadNil);
        };

        let entry = Entry::new(value.clone(), ttl_seconds, self.config.lazy_factor, now_unix());
        self.near.set(key, &entry).await?;
        self.schedule_far_write_and_publish(key.to_string(), entry);

        Ok(value)
    }

    fn debug_hit(&self, tier: &str, key: &str) {
        if self.config.debug {
            tracing::debug!(tier, key, "cache hit");
        }
    }

    /// Background refresh for an obsolete-but-present near entry: prefer a
    /// fresh far entry over re-invoking the loader, per §4.7. Errors are
    /// logged, never surfaced — the original caller already has a usable
    /// value.
    fn schedule_sync_near(&self, key: String, loader: Arc<Loader<T>>, ttl_seconds: i64) {
        let near = self.near.clone();
        let far = self.far.clone();
        let pool = self.pool.clone();
        let shards = self.shards.clone();
        let lazy_factor = self.config.lazy_factor;
        let gid = self.gid;

        let job = async move {
            let now = now_unix();
            // Reuse far's copy only if it is itself fresh (not merely
            // unexpired) — otherwise a far entry sharing the same origin
            // load as the stale near entry would perpetuate staleness
            // until the much later expired horizon. See DESIGN.md.
            match far.get(&key).await {
                Ok(Some(entry)) if !entry.obsoleted(now) => {
                    if let Err(e) = near.set(&key, &entry).await {
                        tracing::error!(key, error = %e, "sync-near: near write failed");
                    }
                    return;
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::debug!(key, error = %CacheError::OutStorageLoadNil, "sync-near: far has nothing cached");
                }
                Err(e) => {
                    tracing::error!(key, error = %e, "sync-near: far read failed");
                    return;
                }
            }

            let _guard = shards.acquire(&key).await;
            match loader(&key).await {
                Ok(Some(value)) => {
                    let entry = Entry::new(value, ttl_seconds, lazy_factor, now_unix());
                    if let Err(e) = near.set(&key, &entry).await {
                        tracing::error!(key, error = %e, "sync-near: near write failed");
                    }
                    let far2 = far.clone();
                    pool.submit(async move {
                        if let Err(e) = far2.set(&key, &entry).await {
                            tracing::error!(key, error = %e, "sync-near: far write failed");
                        }
                        publish_set_from_job(far2.as_ref(), gid, &key, &entry).await;
                    })
                    .await;
                }
                Ok(None) => {
                    tracing::warn!(key, "sync-near: loader returned nothing");
                }
                Err(e) => {
                    tracing::error!(key, error = %e, "sync-near: loader failed");
                }
            }
        };
        let pool_outer = self.pool.clone();
        tokio::spawn(async move { pool_outer.submit(job).await });
    }

    /// Write path. `wait=true` performs near/far/publish in order and
    /// surfaces the first error; `wait=false` enqueues the same sequence on
    /// the pool and returns immediately.
    pub async fn set(&self, key: &str, value: T, ttl_seconds: i64, wait: bool) -> CacheResult<()> {
        self.check_open()?;
        if key.is_empty() {
            return Err(CacheError::CacheKeyEmpty);
        }
        let ttl_seconds = CacheConfig::normalize_ttl(ttl_seconds);
        let entry = Entry::new(value, ttl_seconds, self.config.lazy_factor, now_unix());

        if wait {
            self.near.set(key, &entry).await?;
            self.far.set(key, &entry).await?;
            self.publish_set_sync(key, &entry).await?;
            Ok(())
        } else {
            self.schedule_full_set(key.to_string(), entry);
            Ok(())
        }
    }

    /// Delete path. Far-then-near ordering (§4.9) so a racing near-miss
    /// elsewhere is never repopulated from a stale far entry.
    pub async fn del(&self, key: &str, wait: bool) -> CacheResult<()> {
        self.check_open()?;
        if key.is_empty() {
            return Err(CacheError::CacheKeyEmpty);
        }

        if wait {
            self.far.del(key).await?;
            self.near.del(key).await?;
            self.publish_del_sync(key).await?;
            Ok(())
        } else {
            let far = self.far.clone();
            let near = self.near.clone();
            let key_owned = key.to_string();
            let gid = self.gid;
            let channel_key = key_owned.clone();
            let far_for_publish = self.far.clone();
            self.pool
                .submit(async move {
                    if let Err(e) = far.del(&key_owned).await {
                        tracing::error!(key = %key_owned, error = %e, "async del: far adapter failed");
                    }
                    if let Err(e) = near.del(&key_owned).await {
                        tracing::error!(key = %key_owned, error = %e, "async del: near adapter failed");
                    }
                    if let Some(pubsub) = far_for_publish.as_pubsub() {
                        let message = ChannelMessage {
                            gid,
                            key: channel_key,
                            action: Action::Del,
                            data: None,
                        };
                        if let Err(e) = pubsub.publish(message).await {
                            tracing::error!(error = %e, "async del: publish failed");
                        }
                    }
                })
                .await;
            Ok(())
        }
    }

    /// Used after a synchronous near-write (origin load, §4.6 step 3; §4.7
    /// background refresh): writes far and publishes, never touches near.
    fn schedule_far_write_and_publish(&self, key: String, entry: Entry<T>) {
        let far = self.far.clone();
        let gid = self.gid;
        self.pool_submit(async move {
            if let Err(e) = far.set(&key, &entry).await {
                tracing::error!(key, error = %e, "async set: far adapter failed");
            }
            publish_set_from_job(far.as_ref(), gid, &key, &entry).await;
        });
    }

    /// Used by `Set(..., wait=false)`: near, far, and publish all deferred.
    fn schedule_full_set(&self, key: String, entry: Entry<T>) {
        let near = self.near.clone();
        let far = self.far.clone();
        let gid = self.gid;
        self.pool_submit(async move {
            if let Err(e) = near.set(&key, &entry).await {
                tracing::error!(key, error = %e, "async set: near adapter failed");
            }
            if let Err(e) = far.set(&key, &entry).await {
                tracing::error!(key, error = %e, "async set: far adapter failed");
            }
            publish_set_from_job(far.as_ref(), gid, &key, &entry).await;
        });
    }

    fn pool_submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::spawn(async move { pool.submit(job).await });
    }

    /// Used by `Set(..., wait=true)`: a missing pub/sub capability is a
    /// silent no-op, but an actual publish failure propagates to the caller
    /// since this is the synchronous path.
    async fn publish_set_sync(&self, key: &str, entry: &Entry<T>) -> CacheResult<()> {
        let Some(pubsub) = self.far.as_pubsub() else {
            return Ok(());
        };
        let value = serde_json::to_value(&entry.value)?;
        let message = ChannelMessage {
            gid: self.gid,
            key: key.to_string(),
            action: Action::Set,
            data: Some(entry.clone().map(|_| value)),
        };
        pubsub.publish(message).await
    }

    /// Used by `Del(..., wait=true)`: same no-op/propagate split as
    /// [`Self::publish_set_sync`].
    async fn publish_del_sync(&self, key: &str) -> CacheResult<()> {
        let Some(pubsub) = self.far.as_pubsub() else {
            return Ok(());
        };
        let message = ChannelMessage {
            gid: self.gid,
            key: key.to_string(),
            action: Action::Del,
            data: None,
        };
        pubsub.publish(message).await
    }

    /// Idempotent. Stops the subscriber and monitor tasks, closes both
    /// adapters, and releases the worker pool. Takes `&self`, not `&mut
    /// self`, so it can be called through a shared `Arc<Coordinator<T>>` —
    /// the idempotency check itself is already safe under a shared
    /// reference via `AtomicBool::swap`.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.subscriber_handle.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.monitor_handle.lock().unwrap().take() {
            handle.abort();
        }
        self.near.close().await;
        self.far.close().await;
        self.pool.release().await;
    }
}

/// Publishes a Set notice if `far` implements pub/sub, encoding `entry`'s
/// value generically. Logs and returns on encode/publish failure; callers
/// never surface these since publishing is always a background concern.
async fn publish_set_from_job<T>(far: &dyn FarCache<T>, gid: Uuid, key: &str, entry: &Entry<T>)
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    let Some(pubsub) = far.as_pubsub() else {
        return;
    };
    let data = match serde_json::to_value(&entry.value) {
        Ok(v) => Some(entry.clone().map(|_| v)),
        Err(e) => {
            tracing::error!(key, error = %e, "set: payload encoding failed");
            return;
        }
    };
    let message = ChannelMessage {
        gid,
        key: key.to_string(),
        action: Action::Set,
        data,
    };
    if let Err(e) = pubsub.publish(message).await {
        tracing::error!(key, error = %e, "set: publish failed");
    }
}
