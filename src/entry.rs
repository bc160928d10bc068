//! The value envelope and the freshness model that drives
//! obsolete/expired decisions.

use serde::{Deserialize, Serialize};

/// Envelope around a cached value, carrying the timestamps that drive the
/// stale-while-revalidate state machine.
///
/// `obsolete_at` is the absolute unix-second past which the entry is
/// considered stale-but-usable; `expired_at` is the absolute unix-second
/// past which it is unusable. `expired_at` is computed as
/// `now + ttl_seconds * lazy_factor`, stretching the unusable horizon well
/// beyond the stale horizon so a caller can keep serving the stale value
/// while a refresh runs in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry<T> {
    pub value: T,
    #[serde(rename = "ttl")]
    pub ttl_seconds: i64,
    #[serde(rename = "obsolete")]
    pub obsolete_at: i64,
    #[serde(rename = "expiration")]
    pub expired_at: i64,
}

impl<T> Entry<T> {
    /// Builds a new entry with `ttl_seconds` taken as-is (the `<= 0` floor
    /// is the coordinator's responsibility, applied before this is called).
    pub fn new(value: T, ttl_seconds: i64, lazy_factor: i64, now: i64) -> Self {
        let obsolete_at = now + ttl_seconds;
        let expired_at = now + ttl_seconds * lazy_factor;
        Self {
            value,
            ttl_seconds,
            obsolete_at,
            expired_at,
        }
    }

    /// Usable but stale: the caller receives it, a refresh is scheduled.
    pub fn obsoleted(&self, now: i64) -> bool {
        self.obsolete_at <= 0 || self.obsolete_at < now
    }

    /// Unusable: treated as absent.
    pub fn expired(&self, now: i64) -> bool {
        self.expired_at <= 0 || self.expired_at < now
    }

    /// Seconds remaining until this entry becomes obsolete; may be negative.
    pub fn obsolete_ttl(&self, now: i64) -> i64 {
        self.obsolete_at - now
    }

    /// Seconds remaining until this entry expires; may be negative.
    pub fn expired_ttl(&self, now: i64) -> i64 {
        self.expired_at - now
    }

    /// Maps the wrapped value, keeping the timestamps unchanged. Used when
    /// re-decoding a generically-typed pub/sub payload into a concrete `T`.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Entry<U> {
        Entry {
            value: f(self.value),
            ttl_seconds: self.ttl_seconds,
            obsolete_at: self.obsolete_at,
            expired_at: self.expired_at,
        }
    }
}

pub(crate) fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
