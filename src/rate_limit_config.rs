use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Paths that bypass the limiter: health probes, docs and metrics.
pub const DEFAULT_EXEMPT_PATHS: &str =
    r"^(/actuator(/|$)|/health$|/api/v1/movies/health$|/metrics$|/swagger|/v3/api-docs|/api-docs)";

/// How a bucket regains tokens over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RefillMode {
    /// Every elapsed window adds `refill_tokens` at once, at the window boundary.
    Interval,
    /// Tokens trickle back continuously at `refill_tokens / window`.
    Greedy,
}

/// Configuration for the per-client token buckets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub capacity: u32,
    pub refill_tokens: u32,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub refill_mode: RefillMode,
    /// Hard cap on remembered client identities.
    pub max_tracked_clients: usize,
    /// Full buckets untouched for this long are dropped by the cleanup sweep.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    pub exempt_paths: String,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_tokens: 100,
            window: Duration::from_secs(60),
            refill_mode: RefillMode::Interval,
            max_tracked_clients: 100_000,
            idle_timeout: Duration::from_secs(600),
            exempt_paths: DEFAULT_EXEMPT_PATHS.to_string(),
        }
    }
}

impl RateLimiterConfig {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            refill_tokens: capacity,
            window,
            ..Self::default()
        }
    }

    pub fn with_refill_mode(mut self, mode: RefillMode) -> Self {
        self.refill_mode = mode;
        self
    }

    /// Validate rule parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Rate limit capacity must be greater than 0".to_string());
        }
        if self.refill_tokens == 0 {
            return Err("Refill tokens must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("Refill window must be greater than 0".to_string());
        }
        if self.max_tracked_clients == 0 {
            return Err("Max tracked clients must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.capacity, 100);
        assert_eq!(config.refill_tokens, 100);
        assert_eq!(config.window, Duration::from_secs(60));
        assert_eq!(config.refill_mode, RefillMode::Interval);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_humantime_window() {
        let config: RateLimiterConfig = serde_json::from_str(
            r#"{"capacity": 10, "refill_tokens": 5, "window": "2m", "refill_mode": "greedy"}"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 10);
        assert_eq!(config.window, Duration::from_secs(120));
        assert_eq!(config.refill_mode, RefillMode::Greedy);
        assert_eq!(config.max_tracked_clients, 100_000);
        assert_eq!(config.refill_tokens, 5);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(RateLimiterConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(RateLimiterConfig::new(1, Duration::ZERO).validate().is_err());
    }
}
