//! Tracks when the next application-level ping is due and counts missed
//! read deadlines, kept as a small internal type rather than its own crate
//! (too small to warrant one).

use tokio::time::{Duration, Instant};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
const READ_DEADLINE: Duration = Duration::from_secs(60);
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

pub struct HeartbeatTimer {
    interval: Duration,
    last_ping: Instant,
    consecutive_timeouts: u32,
}

impl HeartbeatTimer {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_ping: Instant::now(), consecutive_timeouts: 0 }
    }

    #[must_use]
    pub fn read_deadline() -> Duration {
        READ_DEADLINE
    }

    #[must_use]
    pub fn due(&self) -> bool {
        self.last_ping.elapsed() >= self.interval
    }

    pub fn mark_sent(&mut self) {
        self.last_ping = Instant::now();
    }

    /// Records a read-deadline timeout. Returns `true` once three have
    /// happened in a row, at which point the caller must reconnect.
    pub fn record_timeout(&mut self) -> bool {
        self.consecutive_timeouts += 1;
        self.consecutive_timeouts >= MAX_CONSECUTIVE_TIMEOUTS
    }

    pub fn record_frame_received(&mut self) {
        self.consecutive_timeouts = 0;
    }
}

impl Default for HeartbeatTimer {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_consecutive_timeouts_trigger_reconnect() {
        let mut timer = HeartbeatTimer::default();
        assert!(!timer.record_timeout());
        assert!(!timer.record_timeout());
        assert!(timer.record_timeout());
    }

    #[test]
    fn a_received_frame_resets_the_timeout_count() {
        let mut timer = HeartbeatTimer::default();
        timer.record_timeout();
        timer.record_timeout();
        timer.record_frame_received();
        assert!(!timer.record_timeout());
    }

    #[test]
    fn not_due_immediately_after_construction() {
        let timer = HeartbeatTimer::new(Duration::from_secs(20));
        assert!(!timer.due());
    }
}
