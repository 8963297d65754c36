//! A seam for time so retry backoff, breaker cooldowns, and animation ticks
//! can be driven deterministically from tests instead of real sleeps.
//!
//! Production callers use [`SystemClock`]; tests use [`FakeClock`] and
//! advance it explicitly, the same "time injected via an explicit parameter"
//! convention the rest of the workspace uses for deterministic testing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Anything that can report "now" as a monotonic instant.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually-advanced clock for tests.
///
/// Holds an offset from a fixed base `Instant` rather than a raw `Instant`
/// so it can be cloned and shared behind an `Arc` while still being advanced
/// from any clone.
#[derive(Debug, Clone)]
pub struct FakeClock {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(500));
        let t1 = clock.now();
        assert!(t1 > t0);
        assert_eq!(t1 - t0, Duration::from_millis(500));
    }

    #[test]
    fn shared_clone_sees_advances() {
        let clock = FakeClock::new();
        let clone = clock.clone();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clone.now(), clock.now());
    }
}
