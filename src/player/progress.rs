//! Fixed-interval progress polling.

use std::time::{Duration, Instant};

/// Shortest allowed poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest allowed poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A recurring timer that is armed while playback runs.
///
/// Disarming it is the cancellation: a disarmed poller is never due.
#[derive(Debug, Clone)]
pub struct ProgressPoller {
    interval: Duration,
    next_due: Option<Instant>,
}

impl ProgressPoller {
    /// Creates a disarmed poller. The interval is clamped to 100-200ms.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arms the timer; the first tick is one interval from `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns true when a tick is due and schedules the next one.
    /// Missed ticks are coalesced into one.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(at) if now >= at => {
                let next = at + self.interval;
                self.next_due = Some(if next > now { next } else { now + self.interval });
                true
            }
            _ => false,
        }
    }
}

/// Converts "percent remaining" into "percent complete", clamped to 0-100.
pub fn completed_percent(remaining: f64) -> f64 {
    if remaining.is_nan() {
        return 0.0;
    }
    (100.0 - remaining).clamp(0.0, 100.0)
}
