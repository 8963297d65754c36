//! Circuit breaker over consecutive permanent failures.
//!
//! Shaped like the retrieval pack's `RiskState`-on-TTL-breach pattern
//! (`InstrumentCache` in `venue-cache.rs`): a small state machine that flips
//! to a "degraded" mode once a threshold is crossed, and recovers after a
//! cooldown.

use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
}

/// Tracks `consecutive_failures` and flips `Open` once they reach
/// `threshold`. Only *permanent* failures count toward the streak; a
/// request that simply timed out once and then succeeded never trips it.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: State,
    consecutive_failures: u32,
    threshold: u32,
    reset_after: std::time::Duration,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, reset_after: std::time::Duration) -> Self {
        Self {
            state: State::Closed,
            consecutive_failures: 0,
            threshold,
            reset_after,
            opened_at: None,
        }
    }

    /// Whether new submissions should be rejected immediately with
    /// `CircuitOpen`. Closes the breaker (and resets the failure counter)
    /// as a side effect if the cooldown has elapsed.
    pub fn is_open_at(&mut self, now: Instant) -> bool {
        match self.state {
            State::Closed => false,
            State::Open => {
                let opened_at = self.opened_at.expect("Open implies opened_at is set");
                if now.duration_since(opened_at) >= self.reset_after {
                    self.state = State::Closed;
                    self.consecutive_failures = 0;
                    self.opened_at = None;
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Call on every successful dispatch completion. Resets the streak.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        if self.state == State::Open {
            self.state = State::Closed;
            self.opened_at = None;
        }
    }

    /// Call when a request exhausts its retries and resolves to a
    /// `PermanentUpstream` failure. Opens the breaker at `threshold`.
    pub fn record_permanent_failure_at(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold && self.state == State::Closed {
            self.state = State::Open;
            self.opened_at = Some(now);
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_open_state(&self) -> bool {
        self.state == State::Open
    }
}
