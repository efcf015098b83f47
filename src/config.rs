use clap::Parser;
use humantime_serde::re::humantime::parse_duration;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::error::{GatewayError, Result};
use crate::fallback::EndpointPolicies;
use crate::rate_limit_config::{RateLimiterConfig, RefillMode, DEFAULT_EXEMPT_PATHS};
use crate::upstream::UpstreamConfig;

pub const DEFAULT_CORS_ORIGINS: [&str; 5] = [
    "http://localhost:3000",
    "http://localhost:3001",
    "http://127.0.0.1:3000",
    "http://frontend:3000",
    "http://localhost:4200",
];

/// Process configuration, read from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "movie-gateway", version, about)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    #[arg(long, env = "OMDB_API_URL", default_value = "https://www.omdbapi.com/")]
    pub omdb_api_url: String,

    #[arg(long, env = "OMDB_API_KEY", hide_env_values = true)]
    pub omdb_api_key: String,

    #[arg(long, env = "OMDB_API_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub omdb_api_timeout: Duration,

    /// Requests each client may make per window
    #[arg(long, env = "RATE_LIMIT_CAPACITY", default_value_t = 100)]
    pub rate_limit_capacity: u32,

    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value = "60s", value_parser = parse_duration)]
    pub rate_limit_window: Duration,

    #[arg(long, env = "RATE_LIMIT_REFILL_MODE", value_enum, default_value = "interval")]
    pub rate_limit_refill_mode: RefillMode,

    #[arg(long, env = "RATE_LIMIT_MAX_CLIENTS", default_value_t = 100_000)]
    pub rate_limit_max_clients: usize,

    #[arg(long, env = "RATE_LIMIT_IDLE_TIMEOUT", default_value = "10m", value_parser = parse_duration)]
    pub rate_limit_idle_timeout: Duration,

    #[arg(long, env = "SEARCH_CACHE_TTL", default_value = "15m", value_parser = parse_duration)]
    pub search_cache_ttl: Duration,

    #[arg(long, env = "DETAILS_CACHE_TTL", default_value = "1h", value_parser = parse_duration)]
    pub details_cache_ttl: Duration,

    #[arg(long, env = "POPULAR_CACHE_TTL", default_value = "30m", value_parser = parse_duration)]
    pub popular_cache_ttl: Duration,

    /// How often idle buckets and expired cache entries are swept
    #[arg(long, env = "CLEANUP_INTERVAL", default_value = "5m", value_parser = parse_duration)]
    pub cleanup_interval: Duration,

    #[arg(
        long,
        env = "CORS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values = DEFAULT_CORS_ORIGINS
    )]
    pub cors_allowed_origins: Vec<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.omdb_api_key.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "OMDB_API_KEY cannot be empty".to_string(),
            ));
        }

        if !self.omdb_api_url.starts_with("http://") && !self.omdb_api_url.starts_with("https://")
        {
            return Err(GatewayError::Configuration(
                "OMDB_API_URL must start with 'http://' or 'https://'".to_string(),
            ));
        }

        if self.omdb_api_timeout.is_zero() {
            return Err(GatewayError::Configuration(
                "OMDB_API_TIMEOUT must be greater than 0".to_string(),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(GatewayError::Configuration(
                "CLEANUP_INTERVAL must be greater than 0".to_string(),
            ));
        }

        self.gateway_config()
            .rate_limit
            .validate()
            .map_err(GatewayError::Configuration)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            rate_limit: RateLimiterConfig {
                capacity: self.rate_limit_capacity,
                refill_tokens: self.rate_limit_capacity,
                window: self.rate_limit_window,
                refill_mode: self.rate_limit_refill_mode,
                max_tracked_clients: self.rate_limit_max_clients,
                idle_timeout: self.rate_limit_idle_timeout,
                exempt_paths: DEFAULT_EXEMPT_PATHS.to_string(),
            },
            cache: CacheConfig {
                search_ttl: self.search_cache_ttl,
                details_ttl: self.details_cache_ttl,
                popular_ttl: self.popular_cache_ttl,
            },
            policies: EndpointPolicies::default(),
            cors_allowed_origins: self.cors_allowed_origins.clone(),
        }
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            base_url: self.omdb_api_url.clone(),
            api_key: self.omdb_api_key.clone(),
            timeout: self.omdb_api_timeout,
        }
    }
}

/// Settings for the request path, independent of how they were loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub rate_limit: RateLimiterConfig,
    pub cache: CacheConfig,
    pub policies: EndpointPolicies,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimiterConfig::default(),
            cache: CacheConfig::default(),
            policies: EndpointPolicies::default(),
            cors_allowed_origins: DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}
