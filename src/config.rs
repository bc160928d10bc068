//! Process-wide tunables for the cache coordination engine.
//!
//! All tunables are collected into an immutable [`CacheConfig`] passed to
//! [`crate::Coordinator::with_config`], rather than mutable package-level
//! globals, so two coordinators in the same process (or two tests in the
//! same binary) never share hidden state.

/// Minimum TTL, in seconds, substituted whenever a caller requests
/// `ttl_seconds <= 0`.
pub const MIN_TTL_SECONDS: i64 = 5;

/// Tunables for a [`crate::Coordinator`] instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Enables verbose per-operation tracing (near/far/origin hit lines).
    pub debug: bool,
    /// Enables the periodic hit-ratio monitor task.
    pub monitor_enabled: bool,
    /// Monitor tick period, in seconds.
    pub monitor_seconds: u64,
    /// Enables the subscriber loop and all publishes.
    pub pubsub_enabled: bool,
    /// Stretch multiplier mapping the obsolete horizon to the expired
    /// horizon. Must be `>= 1`.
    pub lazy_factor: i64,
    /// Number of workers in the background worker pool.
    pub pool_workers: usize,
    /// Capacity of the worker pool's job queue.
    pub pool_queue_len: usize,
    /// Number of shard mutexes guarding single-flight origin loads. Must be
    /// a power of two.
    pub shard_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debug: false,
            monitor_enabled: false,
            monitor_seconds: 5,
            pubsub_enabled: true,
            lazy_factor: 32,
            pool_workers: 16,
            pool_queue_len: 1024,
            shard_count: 256,
        }
    }
}

impl CacheConfig {
    /// Coerces a caller-supplied TTL to the minimum floor when non-positive.
    pub fn normalize_ttl(ttl_seconds: i64) -> i64 {
        if ttl_seconds <= 0 {
            MIN_TTL_SECONDS
        } else {
            ttl_seconds
        }
    }
}
