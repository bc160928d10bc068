//! Hit statistics: four monotonic counters plus derived ratios computed on
//! demand.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of hit counters and their derived ratios at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitStatisticsSnapshot {
    pub access_get_total: u64,
    pub hit_local_storage_total: u64,
    pub hit_out_storage_total: u64,
    pub hit_data_source_total: u64,
    pub hit_local_storage_total_rate: f64,
    pub hit_out_storage_total_rate: f64,
    pub hit_data_source_total_rate: f64,
}

impl fmt::Display for HitStatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gets={} near_hit={} ({:.2}%) far_hit={} ({:.2}%) origin_hit={} ({:.2}%)",
            self.access_get_total,
            self.hit_local_storage_total,
            self.hit_local_storage_total_rate * 100.0,
            self.hit_out_storage_total,
            self.hit_out_storage_total_rate * 100.0,
            self.hit_data_source_total,
            self.hit_data_source_total_rate * 100.0,
        )
    }
}

/// Atomic counters updated from multiple tasks; derived ratios are sampled
/// from a single call to [`HitStatistics::snapshot`].
#[derive(Default)]
pub struct HitStatistics {
    access_get_total: AtomicU64,
    hit_local_storage_total: AtomicU64,
    hit_out_storage_total: AtomicU64,
    hit_data_source_total: AtomicU64,
}

impl HitStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.access_get_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_near_hit(&self) {
        self.hit_local_storage_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_far_hit(&self) {
        self.hit_out_storage_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_origin_hit(&self) {
        self.hit_data_source_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Computes a point-in-time snapshot with derived ratios. `0/0` is
    /// reported as `0.0` rather than `NaN`.
    pub fn snapshot(&self) -> HitStatisticsSnapshot {
        let total = self.access_get_total.load(Ordering::Relaxed);
        let near = self.hit_local_storage_total.load(Ordering::Relaxed);
        let far = self.hit_out_storage_total.load(Ordering::Relaxed);
        let origin = self.hit_data_source_total.load(Ordering::Relaxed);

        let ratio = |hits: u64| if total == 0 { 0.0 } else { hits as f64 / total as f64 };

        HitStatisticsSnapshot {
            access_get_total: total,
            hit_local_storage_total: near,
            hit_out_storage_total: far,
            hit_data_source_total: origin,
            hit_local_storage_total_rate: ratio(near),
            hit_out_storage_total_rate: ratio(far),
            hit_data_source_total_rate: ratio(origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_with_no_activity_has_zero_ratios() {
        let stats = HitStatistics::new();
        let snap = stats.snapshot();
        assert_eq!(snap.access_get_total, 0);
        assert_eq!(snap.hit_local_storage_total_rate, 0.0);
    }

    #[test]
    fn ratios_reflect_recorded_hits() {
        let stats = HitStatistics::new();
        for _ in 0..4 {
            stats.record_get();
        }
        stats.record_near_hit();
        stats.record_near_hit();
        stats.record_far_hit();
        stats.record_origin_hit();

        let snap = stats.snapshot();
        assert_eq!(snap.access_get_total, 4);
        assert_eq!(snap.hit_local_storage_total_rate, 0.5);
        assert_eq!(snap.hit_out_storage_total_rate, 0.25);
        assert_eq!(snap.hit_data_source_total_rate, 0.25);
    }
}
