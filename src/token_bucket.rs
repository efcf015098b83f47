use std::time::{Duration, Instant};

use crate::rate_limit_config::{RateLimiterConfig, RefillMode};

/// A single capacity-bounded token pool.
///
/// Time is always passed in by the caller so the bucket itself never reads a
/// clock. Token count stays within `[0, capacity]`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u32,
    tokens: f64,
    refill_tokens: f64,
    window: Duration,
    mode: RefillMode,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(config: &RateLimiterConfig, now: Instant) -> Self {
        Self {
            capacity: config.capacity,
            tokens: config.capacity as f64,
            refill_tokens: config.refill_tokens as f64,
            window: config.window,
            mode: config.refill_mode,
            last_refill: now,
        }
    }

    pub fn try_consume(&mut self, tokens: u32, now: Instant) -> bool {
        self.refill(now);

        if self.tokens >= tokens as f64 {
            self.tokens -= tokens as f64;
            true
        } else {
            false
        }
    }

    pub fn available_tokens(&mut self, now: Instant) -> u32 {
        self.refill(now);
        self.tokens.floor() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= self.capacity as f64
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let capacity = self.capacity as f64;

        match self.mode {
            RefillMode::Greedy => {
                let rate = self.refill_tokens / self.window.as_secs_f64();
                self.tokens = (self.tokens + rate * elapsed.as_secs_f64()).min(capacity);
                self.last_refill = now;
            }
            RefillMode::Interval => {
                let periods = u32::try_from(elapsed.as_nanos() / self.window.as_nanos().max(1))
                    .unwrap_or(u32::MAX);
                if periods > 0 {
                    self.tokens = (self.tokens + self.refill_tokens * periods as f64).min(capacity);
                    // Stay aligned to window boundaries rather than to `now`.
                    self.last_refill = self
                        .last_refill
                        .checked_add(self.window.saturating_mul(periods))
                        .map_or(now, |next| next.min(now));
                }
            }
        }
    }

    /// Wait until `required` tokens can be consumed, `Duration::ZERO` if they already can.
    pub fn time_until_available(&mut self, required: u32, now: Instant) -> Duration {
        self.refill(now);

        let missing = required as f64 - self.tokens;
        if missing <= 0.0 {
            return Duration::ZERO;
        }

        match self.mode {
            RefillMode::Greedy => {
                let rate = self.refill_tokens / self.window.as_secs_f64();
                Duration::from_secs_f64(missing / rate)
            }
            RefillMode::Interval => {
                let periods = (missing / self.refill_tokens).ceil() as u32;
                self.last_refill
                    .checked_add(self.window.saturating_mul(periods))
                    .map_or(Duration::MAX, |ready| ready.saturating_duration_since(now))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: u32, window_secs: u64, mode: RefillMode) -> RateLimiterConfig {
        RateLimiterConfig::new(capacity, Duration::from_secs(window_secs)).with_refill_mode(mode)
    }

    #[test]
    fn test_token_consumption() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(&config(10, 60, RefillMode::Interval), now);
        assert!(bucket.try_consume(5, now));
        assert_eq!(bucket.available_tokens(now), 5);
        assert!(bucket.try_consume(5, now));
        assert_eq!(bucket.available_tokens(now), 0);
        assert!(!bucket.try_consume(1, now));
        assert_eq!(bucket.available_tokens(now), 0);
    }

    #[test]
    fn test_interval_refill_counts_periods_beyond_u32() {
        let start = Instant::now();
        let config = RateLimiterConfig::new(1, Duration::from_nanos(1));
        let mut bucket = TokenBucket::new(&config, start);
        assert!(bucket.try_consume(1, start));

        // 2^32 elapsed windows would wrap to zero periods if truncated.
        let later = start + Duration::from_nanos(1 << 32);
        assert!(bucket.try_consume(1, later));
    }

    #[test]
    fn test_interval_refill_happens_at_window_boundary() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(&config(10, 60, RefillMode::Interval), start);
        assert!(bucket.try_consume(10, start));

        let almost = start + Duration::from_secs(59);
        assert!(!bucket.try_consume(1, almost));
        assert_eq!(
            bucket.time_until_available(1, almost),
            Duration::from_secs(1)
        );

        let boundary = start + Duration::from_secs(60);
        assert_eq!(bucket.available_tokens(boundary), 10);
    }

    #[test]
    fn test_interval_refill_keeps_window_alignment() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(&config(10, 60, RefillMode::Interval), start);
        assert!(bucket.try_consume(10, start));

        // Refilled at t=60 even though observed at t=90; next boundary is t=120.
        let t90 = start + Duration::from_secs(90);
        assert!(bucket.try_consume(10, t90));
        assert_eq!(
            bucket.time_until_available(1, t90),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_greedy_refill_is_continuous() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(&config(60, 60, RefillMode::Greedy), start);
        assert!(bucket.try_consume(60, start));

        let later = start + Duration::from_secs(10);
        assert_eq!(bucket.available_tokens(later), 10);
        assert_eq!(bucket.time_until_available(11, later), Duration::from_secs(1));
    }

    #[test]
    fn test_capacity_overflow_prevention() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(&config(5, 1, RefillMode::Greedy), start);
        assert!(bucket.try_consume(3, start));

        let much_later = start + Duration::from_secs(3600);
        assert_eq!(bucket.available_tokens(much_later), 5);
        assert!(bucket.is_full(much_later));
    }

    #[test]
    fn test_time_until_available_when_tokens_present() {
        let now = Instant::now();
        let mut bucket = TokenBucket::new(&config(5, 60, RefillMode::Interval), now);
        assert_eq!(bucket.time_until_available(1, now), Duration::ZERO);
    }
}
