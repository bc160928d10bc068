//! Error taxonomy surfaced by the public coordinator API.
//!
//! Kinds, not type names, per the behavioral contract: closed-state errors,
//! invalid-argument errors, "loader returned nothing" errors, missing
//! capability errors, and opaque adapter errors. A manual `Display` impl
//! covers the handful of variants rather than pulling in a derive crate.

use std::fmt;

/// Errors returned from [`crate::Coordinator`] operations.
#[derive(Debug)]
pub enum CacheError {
    /// The coordinator has been closed; no further operations are served.
    CacheClosed,
    /// The near-cache adapter has been closed.
    LocalStorageClosed,
    /// The far-cache adapter has been closed.
    OutStorageClosed,
    /// `Get`/`Set`/`Del` was called with an empty key.
    CacheKeyEmpty,
    /// A codec target was required but absent.
    CacheObjectNil,
    /// The origin loader returned nothing without an error, which is
    /// distinct from "not found" (`found = false`, no error).
    DataSourceLoadNil,
    /// The far adapter returned nothing without an error, which is distinct
    /// from "not found" (`found = false`, no error).
    OutStorageLoadNil,
    /// The far adapter was asked to act as a pub/sub transport but does not
    /// implement the capability.
    CacheNotImplementPubSub,
    /// An I/O or codec failure surfaced by a near/far adapter, propagated
    /// as-is.
    Adapter(anyhow::Error),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheClosed => write!(f, "cache is closed"),
            Self::LocalStorageClosed => write!(f, "near storage is closed"),
            Self::OutStorageClosed => write!(f, "far storage is closed"),
            Self::CacheKeyEmpty => write!(f, "cache key is empty"),
            Self::CacheObjectNil => write!(f, "cache object target is nil"),
            Self::DataSourceLoadNil => write!(f, "data source load returned nil"),
            Self::OutStorageLoadNil => write!(f, "out storage load returned nil"),
            Self::CacheNotImplementPubSub => {
                write!(f, "far cache does not implement pub/sub")
            }
            Self::Adapter(err) => write!(f, "adapter error: {err}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Adapter(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        Self::Adapter(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Adapter(err.into())
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
