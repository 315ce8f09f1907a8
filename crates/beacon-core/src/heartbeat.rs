//! Heartbeat scheduling
//!
//! The monitor is a repeating deadline. Its owner asks for the next due
//! instant, sleeps until then and calls [`HeartbeatMonitor::poll`]. Stopping
//! clears the deadline so a stopped monitor never fires.

use std::time::{Duration, Instant};

/// Repeating heartbeat deadline
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Option<Duration>,
    next_due: Option<Instant>,
    beats: u64,
}

impl HeartbeatMonitor {
    /// Monitor firing every `interval_ms`; zero disables it
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Self::interval_from_ms(interval_ms),
            next_due: None,
            beats: 0,
        }
    }

    fn interval_from_ms(interval_ms: u64) -> Option<Duration> {
        (interval_ms > 0).then(|| Duration::from_millis(interval_ms))
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Arm the first deadline one interval from `now`
    pub fn start(&mut self, now: Instant) {
        self.next_due = self.interval.map(|interval| now + interval);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Number of times the monitor has fired
    pub fn beats(&self) -> u64 {
        self.beats
    }

    /// Change the period, re-arming from `now` if the monitor is running
    pub fn set_interval(&mut self, interval_ms: u64, now: Instant) {
        let was_running = self.is_running();
        self.interval = Self::interval_from_ms(interval_ms);
        if was_running {
            self.start(now);
        }
    }

    /// Returns true when a beat is due at `now` and re-arms the deadline
    ///
    /// Missed periods are not replayed: at most one beat fires per poll and
    /// the next deadline is always in the future.
    pub fn poll(&mut self, now: Instant) -> bool {
        let (Some(due), Some(interval)) = (self.next_due, self.interval) else {
            return false;
        };
        if now < due {
            return false;
        }

        let mut next = due + interval;
        if next <= now {
            next = now + interval;
        }
        self.next_due = Some(next);
        self.beats += 1;
        true
    }
}
