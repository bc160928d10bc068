//! Periodic hit-ratio monitor: ticks on an interval and logs a
//! [`crate::HitStatistics`] snapshot until aborted.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::stats::HitStatistics;

/// Spawns a task that logs [`HitStatistics`] ratios every `period` until
/// the returned handle is aborted.
pub fn spawn(stats: Arc<HitStatistics>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let snapshot = stats.snapshot();
            tracing::info!(%snapshot, "cache hit ratio monitor tick");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn monitor_emits_without_panicking() {
        let stats = Arc::new(HitStatistics::new());
        stats.record_get();
        stats.record_near_hit();
        let handle = spawn(stats, Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(35)).await;
        handle.abort();
        let _ = handle.await;
    }
}
