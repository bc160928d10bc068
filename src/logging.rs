//! Tracing setup for applications embedding this crate.
//!
//! The coordination engine itself only ever calls `tracing::{debug,info,
//! warn,error}!` — it never installs a subscriber. This module offers a
//! ready `tracing_subscriber::registry()` default for binaries that want
//! one.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a JSON-formatted tracing subscriber honoring `RUST_LOG`,
/// defaulting to `info` when unset.
pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}
