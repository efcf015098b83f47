use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::RegionStats;

/// Process-wide gateway counters.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    requests_admitted: AtomicU64,
    requests_throttled: AtomicU64,
    upstream_failures: AtomicU64,
    degraded_responses: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_admitted: u64,
    pub requests_throttled: u64,
    pub upstream_failures: u64,
    pub degraded_responses: u64,
    pub tracked_clients: usize,
    pub cache: BTreeMap<&'static str, RegionStats>,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admission(&self, allowed: bool) {
        let counter = if allowed {
            &self.requests_admitted
        } else {
            &self.requests_throttled
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upstream_failures(&self) -> u64 {
        self.upstream_failures.load(Ordering::Relaxed)
    }

    pub fn degraded_responses(&self) -> u64 {
        self.degraded_responses.load(Ordering::Relaxed)
    }

    pub fn snapshot(
        &self,
        tracked_clients: usize,
        cache: impl IntoIterator<Item = (&'static str, RegionStats)>,
    ) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_admitted: self.requests_admitted.load(Ordering::Relaxed),
            requests_throttled: self.requests_throttled.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures(),
            degraded_responses: self.degraded_responses(),
            tracked_clients,
            cache: cache.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = GatewayMetrics::new();
        metrics.record_admission(true);
        metrics.record_admission(true);
        metrics.record_admission(false);
        metrics.record_upstream_failure();
        metrics.record_degraded();

        let snapshot = metrics.snapshot(
            2,
            [("search-results", RegionStats { entries: 1, hits: 3, misses: 1 })],
        );
        assert_eq!(snapshot.requests_admitted, 2);
        assert_eq!(snapshot.requests_throttled, 1);
        assert_eq!(snapshot.upstream_failures, 1);
        assert_eq!(snapshot.degraded_responses, 1);
        assert_eq!(snapshot.cache["search-results"].hits, 3);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["tracked_clients"], 2);
    }
}
