use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{GatewayError, Result};
use crate::rate_limit_config::RateLimiterConfig;
use crate::token_bucket::TokenBucket;

/// Share of the client map freed at once when it reaches its cap.
const EVICTION_BATCH_DIVISOR: usize = 100;

/// Outcome of a single admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub remaining: u32,
}

#[derive(Debug)]
struct ClientBucket {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Per-client token bucket limiter.
///
/// Each identity owns an independently locked bucket; the map itself is only
/// write-locked (per shard) when an identity is first seen or evicted.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimiterConfig>,
    buckets: Arc<DashMap<String, Mutex<ClientBucket>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate().map_err(GatewayError::Configuration)?;

        Ok(Self {
            config: Arc::new(config),
            buckets: Arc::new(DashMap::new()),
            clock,
        })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Try to take one token for `identity`.
    pub fn admit(&self, identity: &str) -> Result<Admission> {
        let now = self.clock.now();

        if let Some(entry) = self.buckets.get(identity) {
            return Self::consume(identity, entry.value(), now);
        }

        self.make_room(now);
        let entry = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| {
                debug!(client = identity, "Created new rate limiting bucket");
                Mutex::new(ClientBucket {
                    bucket: TokenBucket::new(&self.config, now),
                    last_seen: now,
                })
            })
            .downgrade();

        Self::consume(identity, entry.value(), now)
    }

    fn consume(identity: &str, slot: &Mutex<ClientBucket>, now: Instant) -> Result<Admission> {
        let mut client = slot.lock().map_err(|_| {
            GatewayError::Internal("Failed to acquire lock on client bucket".to_string())
        })?;

        client.last_seen = now;
        let allowed = client.bucket.try_consume(1, now);
        let remaining = client.bucket.available_tokens(now);

        if allowed {
            debug!(client = identity, remaining, "Request allowed");
        } else {
            warn!(client = identity, "Rate limit exceeded");
        }

        Ok(Admission { allowed, remaining })
    }

    /// Whole seconds until one token is available again, rounded up.
    pub fn seconds_until_refill(&self, identity: &str) -> Result<u64> {
        let now = self.clock.now();

        let Some(entry) = self.buckets.get(identity) else {
            // An unseen identity would get a full bucket.
            return Ok(0);
        };

        let mut client = entry.value().lock().map_err(|_| {
            GatewayError::Internal("Failed to acquire lock on client bucket".to_string())
        })?;

        let wait = client.bucket.time_until_available(1, now);
        Ok(wait.as_secs() + u64::from(wait.subsec_nanos() > 0))
    }

    /// Number of identities currently remembered.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that are full again and have been idle past the idle timeout.
    ///
    /// A dropped identity comes back with a full bucket, which is exactly the
    /// state it was evicted in.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let idle_timeout = self.config.idle_timeout;
        let before = self.buckets.len();

        self.buckets.retain(|_, slot| match slot.get_mut() {
            Ok(client) => {
                now.saturating_duration_since(client.last_seen) < idle_timeout
                    || !client.bucket.is_full(now)
            }
            Err(_) => false,
        });

        before.saturating_sub(self.buckets.len())
    }

    /// Keep the map under `max_tracked_clients` before a new identity is inserted.
    ///
    /// At the cap, the least recently seen `1/EVICTION_BATCH_DIVISOR` of the map
    /// is dropped in one pass, so the following arrivals find room without a scan.
    fn make_room(&self, now: Instant) {
        let max = self.config.max_tracked_clients;
        let tracked = self.buckets.len();
        if tracked < max {
            return;
        }

        let mut by_age: Vec<(Instant, String)> = self
            .buckets
            .iter()
            .map(|entry| {
                let last_seen = entry
                    .value()
                    .lock()
                    .map(|client| client.last_seen)
                    .unwrap_or(now);
                (last_seen, entry.key().clone())
            })
            .collect();

        let batch = (tracked - max + (max / EVICTION_BATCH_DIVISOR).max(1)).min(by_age.len());
        if batch < by_age.len() {
            by_age.select_nth_unstable_by_key(batch, |(last_seen, _)| *last_seen);
        }

        for (_, identity) in by_age.drain(..batch) {
            self.buckets.remove(&identity);
        }
        warn!(
            evicted = batch,
            max_tracked_clients = max,
            "Client map at capacity, evicted least recently seen buckets"
        );
    }
}
