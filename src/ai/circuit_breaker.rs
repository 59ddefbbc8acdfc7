//! Circuit breaker for the remote model dependency
//!
//! Two states: Closed (calls proceed) and Open (calls fast-fail before any
//! I/O). The breaker opens after a threshold of consecutive failures and
//! re-closes only on the next recorded success. There is deliberately no
//! automatic half-open recovery timer; recovery is driven by an explicit
//! success from a caller that got through while the gate was disabled or
//! before it tripped.
//!
//! Counters are lock-free atomics so the invariant survives interleaved
//! updates from concurrent calls on a multi-threaded runtime.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Consecutive failures before the breaker opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Process-wide health tracker for the remote model service. Constructed once
/// and shared by reference across all concurrent engine calls.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    consecutive_failures: AtomicU32,
    open: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold,
            consecutive_failures: AtomicU32::new(0),
            open: AtomicBool::new(false),
        }
    }

    /// Whether new calls should fast-fail.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Record a successful model call: resets the consecutive-failure counter
    /// and closes the breaker.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }

    /// Record a failed model call; opens the breaker once the consecutive
    /// count reaches the threshold.
    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.failure_threshold {
            self.open.store(true, Ordering::SeqCst);
        }
    }

    /// Current consecutive-failure count, for health introspection.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_closed() {
        let breaker = CircuitBreaker::default();
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::default();
        for _ in 0..4 {
            breaker.record_failure();
            assert!(!breaker.is_open());
        }
        breaker.record_failure();
        assert!(breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 5);
    }

    #[test]
    fn test_success_resets_counter_and_closes() {
        let breaker = CircuitBreaker::default();
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_intervening_success_prevents_opening() {
        let breaker = CircuitBreaker::default();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_custom_threshold() {
        let breaker = CircuitBreaker::new(2);
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }
}
