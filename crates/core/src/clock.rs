//! Time sources (spec §9 "Time source") — wall-clock for event timestamps,
//! monotonic for debounces and deadlines. Both are injectable so detector and
//! validator tests can drive time deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Wall-clock time, injected wherever an event timestamp or a persisted
/// deadline is produced.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Monotonic time, injected wherever per-symbol debounce or analysis-gap
/// logic needs a clock that cannot go backwards across an NTP step.
pub trait MonotonicClock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The real system monotonic clock, anchored at construction time.
#[derive(Debug, Clone)]
pub struct SystemMonotonicClock {
    origin: Instant,
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now_ms(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

/// A manually-advanced clock pair for deterministic tests: both `WallClock`
/// and `MonotonicClock` read from the same atomic, advanced only by `advance`.
#[derive(Debug, Clone)]
pub struct TestClock {
    millis: Arc<AtomicI64>,
}

impl TestClock {
    #[must_use]
    pub fn at(start_ms: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl WallClock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_else(Utc::now)
    }
}

impl MonotonicClock for TestClock {
    fn now_ms(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_both_views_together() {
        let clock = TestClock::at(1_000);
        let before = clock.now_ms();
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now_ms(), before + 500);
    }

    #[test]
    fn system_monotonic_clock_never_goes_backwards() {
        let clock = SystemMonotonicClock::default();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
