//! Request throttling and failure isolation for source adapters

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

/// Blocking wrapper over a direct rate limiter
///
/// Adapters run on blocking threads, so `wait` simply parks the thread
/// until a permit is available.
pub struct Throttle {
    limiter: DefaultDirectRateLimiter,
}

impl Throttle {
    /// Allow up to `rate` requests per second (minimum 1)
    pub fn per_second(rate: u32) -> Self {
        let rate = NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
        }
    }

    /// Block until a request permit is available
    pub fn wait(&self) {
        while self.limiter.check().is_err() {
            std::thread::sleep(Duration::from_millis(25));
        }
    }
}

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
}

/// Consecutive-failure circuit breaker
///
/// After `failure_threshold` consecutive failures the circuit opens and
/// calls are refused until `reset_timeout` has elapsed. The first call
/// after the timeout is a probe: a success closes the circuit fully, a
/// failure reopens it immediately.
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    failures: u32,
    state: BreakerState,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a breaker with the given threshold and reset timeout
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            failures: 0,
            state: BreakerState::Closed,
            opened_at: None,
        }
    }

    /// True when a call may proceed
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.reset_timeout {
                    // Half-open: permit one probe; a failure reopens
                    self.state = BreakerState::Closed;
                    self.opened_at = None;
                    self.failures = self.failure_threshold.saturating_sub(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call, closing the circuit
    pub fn record_success(&mut self) {
        self.failures = 0;
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    /// Record a failed call, opening the circuit at the threshold
    pub fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures >= self.failure_threshold {
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }

    /// True when calls are currently refused
    pub fn is_open(&self) -> bool {
        self.state == BreakerState::Open
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_opens_at_threshold() {
        let mut breaker = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(breaker.allow());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(!breaker.allow());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let mut breaker = CircuitBreaker::new(2, Duration::from_secs(60));

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_half_open_probe() {
        let mut breaker = CircuitBreaker::new(2, Duration::ZERO);

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        // Timeout elapsed (zero), probe is allowed
        assert!(breaker.allow());

        // A single failure on the probe reopens
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_throttle_minimum_rate() {
        // Zero is bumped to one permit per second rather than panicking
        let throttle = Throttle::per_second(0);
        throttle.wait();
    }
}
