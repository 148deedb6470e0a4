//! Core rate limiter implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::Clock;
use super::store::RequestLog;
use crate::error::{BreakwaterError, Result};

/// Configuration for a single sliding-window limit.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Name of this limit, used in logs and alert notifications.
    pub name: String,
    /// Duration of the sliding window.
    pub window: Duration,
    /// Maximum countable requests allowed inside the window.
    pub max_requests: u64,
    /// Exclude requests that completed successfully from the count.
    pub skip_successful: bool,
    /// Exclude requests that failed from the count.
    pub skip_failed: bool,
}

impl LimiterConfig {
    /// Create a configuration that counts every request.
    pub fn new(name: impl Into<String>, window: Duration, max_requests: u64) -> Self {
        Self {
            name: name.into(),
            window,
            max_requests,
            skip_successful: false,
            skip_failed: false,
        }
    }

    /// Reject zero-valued windows and limits before any request is served.
    pub fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(BreakwaterError::Config(format!(
                "limit '{}': window must be positive",
                self.name
            )));
        }
        if self.max_requests == 0 {
            return Err(BreakwaterError::Config(format!(
                "limit '{}': max_requests must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request was denied.
    pub limited: bool,
    /// The configured cap for the matched limit.
    pub limit: u64,
    /// Slots left in the window after this check.
    pub remaining: u64,
    /// Time until the oldest in-window record ages out and frees a slot.
    pub reset_after: Duration,
}

/// Sliding-window rate limiter over a set of keyed request logs.
///
/// This struct is thread-safe and can be shared across multiple tasks.
/// The read-prune-count-append sequence for a key runs under that key's
/// map entry guard, so two concurrent checks cannot both claim the last
/// remaining slot.
pub struct RateLimiter {
    /// Validated limit configuration.
    config: LimiterConfig,
    /// Request logs indexed by partition key.
    stores: DashMap<String, RequestLog>,
    /// Source of "now" for window arithmetic.
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter, validating its configuration up front.
    pub fn new(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stores: DashMap::new(),
            clock,
        })
    }

    /// The configuration this limiter enforces.
    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Check and record a request attempt for `key`.
    ///
    /// A denied attempt is not recorded, so a saturated key recovers as
    /// soon as the oldest in-window records age out.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut log = self.stores.entry(key.to_string()).or_default();

        log.prune(now, self.config.window);
        let count = log.countable(self.config.skip_successful, self.config.skip_failed) as u64;

        if count >= self.config.max_requests {
            debug!(
                key = %key,
                limit = self.config.max_requests,
                name = %self.config.name,
                "Rate limit exceeded"
            );
            return RateLimitDecision {
                limited: true,
                limit: self.config.max_requests,
                remaining: 0,
                reset_after: self.reset_after(&log, now),
            };
        }

        log.push(now);

        trace!(
            key = %key,
            count = count + 1,
            limit = self.config.max_requests,
            "Request admitted"
        );

        RateLimitDecision {
            limited: false,
            limit: self.config.max_requests,
            remaining: self.config.max_requests - count - 1,
            reset_after: self.reset_after(&log, now),
        }
    }

    /// Backfill the outcome of the most recent attempt for `key`.
    ///
    /// Callers invoke this after the downstream handler completes;
    /// without it, outcome-based skipping counts every request.
    pub fn record_outcome(&self, key: &str, success: bool) {
        if let Some(mut log) = self.stores.get_mut(key) {
            log.record_outcome(success);
        }
    }

    /// Prune every store and drop the ones left empty.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let window = self.config.window;
        self.stores.retain(|_, log| {
            log.prune(now, window);
            !log.is_empty()
        });
    }

    /// Number of keys currently tracked.
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Whether a store currently exists for `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.stores.contains_key(key)
    }

    /// Clear all stores.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.stores.clear();
    }

    /// Time until the oldest record in `log` leaves the window.
    ///
    /// An empty log resets a full window from now.
    fn reset_after(&self, log: &RequestLog, now: Instant) -> Duration {
        match log.oldest() {
            Some(oldest) => self.config.window.saturating_sub(now.duration_since(oldest)),
            None => self.config.window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;

    fn limiter(max_requests: u64, window: Duration) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = LimiterConfig::new("test", window, max_requests);
        let limiter = RateLimiter::new(config, clock.clone()).unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = LimiterConfig::new("bad", Duration::ZERO, 5);
        let result = RateLimiter::new(config, Arc::new(ManualClock::new()));
        assert!(matches!(result, Err(BreakwaterError::Config(_))));
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let config = LimiterConfig::new("bad", Duration::from_secs(60), 0);
        let result = RateLimiter::new(config, Arc::new(ManualClock::new()));
        assert!(matches!(result, Err(BreakwaterError::Config(_))));
    }

    #[test]
    fn test_check_creates_store_lazily() {
        let (limiter, _clock) = limiter(5, Duration::from_secs(60));
        assert_eq!(limiter.store_count(), 0);

        limiter.check("key");
        assert_eq!(limiter.store_count(), 1);
        assert!(limiter.has_key("key"));
    }

    #[test]
    fn test_requests_allowed_up_to_limit_then_denied() {
        let (limiter, _clock) = limiter(5, Duration::from_secs(60));

        for expected_remaining in [4, 3, 2, 1, 0] {
            let decision = limiter.check("key");
            assert!(!decision.limited);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check("key");
        assert!(decision.limited);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_denied_attempts_are_not_recorded() {
        let (limiter, _clock) = limiter(2, Duration::from_secs(60));

        limiter.check("key");
        limiter.check("key");

        // Hammering a saturated key must not append phantom records
        // or push remaining below zero.
        for _ in 0..10 {
            let decision = limiter.check("key");
            assert!(decision.limited);
            assert_eq!(decision.remaining, 0);
        }
    }

    #[test]
    fn test_recovery_after_window_elapses() {
        let (limiter, clock) = limiter(1, Duration::from_secs(60));

        assert!(!limiter.check("key").limited);
        assert!(limiter.check("key").limited);

        clock.advance(Duration::from_secs(60));
        assert!(!limiter.check("key").limited);
    }

    #[test]
    fn test_per_key_isolation() {
        let (limiter, _clock) = limiter(2, Duration::from_secs(60));

        limiter.check("a");
        limiter.check("a");
        assert!(limiter.check("a").limited);

        // Key "b" still has its full quota.
        let decision = limiter.check("b");
        assert!(!decision.limited);
        assert_eq!(decision.remaining, 1);
    }

    #[test]
    fn test_skip_successful_excludes_reported_successes() {
        let clock = Arc::new(ManualClock::new());
        let mut config = LimiterConfig::new("auth", Duration::from_secs(60), 2);
        config.skip_successful = true;
        let limiter = RateLimiter::new(config, clock).unwrap();

        // Each success is backfilled and then skipped, so raw attempts
        // can exceed max_requests.
        for _ in 0..5 {
            let decision = limiter.check("key");
            assert!(!decision.limited);
            limiter.record_outcome("key", true);
        }

        // Failures still count.
        assert!(!limiter.check("key").limited);
        limiter.record_outcome("key", false);
        assert!(!limiter.check("key").limited);
        limiter.record_outcome("key", false);
        assert!(limiter.check("key").limited);
    }

    #[test]
    fn test_skip_failed_excludes_reported_failures() {
        let clock = Arc::new(ManualClock::new());
        let mut config = LimiterConfig::new("test", Duration::from_secs(60), 1);
        config.skip_failed = true;
        let limiter = RateLimiter::new(config, clock).unwrap();

        assert!(!limiter.check("key").limited);
        limiter.record_outcome("key", false);
        assert!(!limiter.check("key").limited);
    }

    #[test]
    fn test_reset_after_tracks_oldest_record() {
        let (limiter, clock) = limiter(5, Duration::from_secs(60));

        limiter.check("key");
        clock.advance(Duration::from_secs(10));

        let decision = limiter.check("key");
        assert_eq!(decision.reset_after, Duration::from_secs(50));
    }

    #[test]
    fn test_concrete_scenario() {
        // window = 60s, max = 5, all traffic under one composite key.
        let (limiter, clock) = limiter(5, Duration::from_secs(60));
        let key = "1.2.3.4:UA:/api/x";

        for expected_remaining in [4, 3, 2, 1, 0] {
            let decision = limiter.check(key);
            assert!(!decision.limited);
            assert_eq!(decision.remaining, expected_remaining);
        }

        // 6th request at t=1s: denied, recovery when the t=0 records
        // age out at t=60s.
        clock.advance(Duration::from_secs(1));
        let decision = limiter.check(key);
        assert!(decision.limited);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_after, Duration::from_secs(59));

        // 7th request at t=61.001s: every t=0 record has aged out.
        clock.advance(Duration::from_millis(60_001));
        let decision = limiter.check(key);
        assert!(!decision.limited);
    }

    #[test]
    fn test_sweep_drops_empty_stores() {
        let (limiter, clock) = limiter(5, Duration::from_secs(60));

        limiter.check("stale");
        clock.advance(Duration::from_secs(30));
        limiter.check("fresh");
        clock.advance(Duration::from_secs(40));

        limiter.sweep();
        assert!(!limiter.has_key("stale"));
        assert!(limiter.has_key("fresh"));
    }

    #[test]
    fn test_clear_stores() {
        let (limiter, _clock) = limiter(5, Duration::from_secs(60));

        limiter.check("key");
        assert_eq!(limiter.store_count(), 1);

        limiter.clear();
        assert_eq!(limiter.store_count(), 0);
    }
}
