use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::handlers::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub tracked_clients: usize,
    pub cache_entries: BTreeMap<String, usize>,
}

pub struct HealthChecker;

impl HealthChecker {
    /// Healthy whenever the process can answer; there are no connections to probe.
    pub fn check_health(state: &AppState) -> HealthStatus {
        let cache_entries = state
            .gateway
            .caches()
            .stats()
            .into_iter()
            .map(|(region, stats)| (region.to_string(), stats.entries))
            .collect();

        HealthStatus {
            status: "healthy".to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            tracked_clients: state.rate_limiter.tracked_clients(),
            cache_entries,
        }
    }
}
