//! Two-tier near/far cache coordination engine.
//!
//! Sits between application code and a slow authoritative data source,
//! providing a read-through/write-through API backed by a fast in-process
//! near cache, a shared far cache, single-flight origin loads, and
//! cross-instance invalidation over a pub/sub backplane.

pub mod codec;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod far;
pub mod hash;
pub mod key;
pub mod logging;
pub mod monitor;
pub mod near;
pub mod pool;
pub mod pubsub;
pub mod shard;
pub mod stats;
pub mod subscriber;

pub use config::CacheConfig;
pub use coordinator::{Coordinator, Loader};
pub use entry::Entry;
pub use error::{CacheError, CacheResult};
pub use far::{FarCache, InMemoryFarCache};
pub use key::{gen_key, KeyPart};
pub use near::{InMemoryNearCache, NearCache};
pub use pubsub::{Action, ChannelMessage, InMemoryPubSub, PubSub};
pub use stats::{HitStatistics, HitStatisticsSnapshot};
