//! Keyed response cache with per-region TTLs.
//!
//! Each [`ResponseCache`] is one named region. Expiry is lazy: an entry older
//! than its TTL is treated as absent on read and replaced by the next load.
//! [`CacheRegions::purge_expired`] reclaims memory in the background without
//! changing what readers observe.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::clock::Clock;
use crate::models::{MovieDetails, MovieSummary, SearchResponse};

pub const SEARCH_RESULTS: &str = "search-results";
pub const ITEM_DETAILS: &str = "item-details";
pub const CURATED_LIST: &str = "curated-list";

/// Fixed TTL policy for each region.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(with = "humantime_serde")]
    pub search_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub details_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub popular_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl: Duration::from_secs(15 * 60),
            details_ttl: Duration::from_secs(60 * 60),
            popular_ttl: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// One named cache region.
pub struct ResponseCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            entries: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live value for `key`, or run `loader` and remember its result.
    ///
    /// Loader failures are returned untouched and nothing is stored. Concurrent
    /// misses on the same key may each run the loader; the last one to finish
    /// wins.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            debug!(region = self.name, key, "Cache hit");
            return Ok(value);
        }

        let value = loader().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
            ttl: self.ttl,
        };
        self.entries.insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> RegionStats {
        RegionStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// The three regions the gateway caches into.
pub struct CacheRegions {
    pub search: ResponseCache<SearchResponse>,
    pub details: ResponseCache<MovieDetails>,
    pub popular: ResponseCache<Vec<MovieSummary>>,
}

impl CacheRegions {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            search: ResponseCache::new(SEARCH_RESULTS, config.search_ttl, clock.clone()),
            details: ResponseCache::new(ITEM_DETAILS, config.details_ttl, clock.clone()),
            popular: ResponseCache::new(CURATED_LIST, config.popular_ttl, clock),
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.search.purge_expired() + self.details.purge_expired() + self.popular.purge_expired()
    }

    pub fn stats(&self) -> Vec<(&'static str, RegionStats)> {
        vec![
            (self.search.name(), self.search.stats()),
            (self.details.name(), self.details.stats()),
            (self.popular.name(), self.popular.stats()),
        ]
    }
}
