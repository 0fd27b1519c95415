//! Minimum spacing between connection attempts.

use std::time::{Duration, Instant};

/// Tracks when the transmitter last tried to connect.
#[derive(Debug)]
pub struct ReconnectGate {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl ReconnectGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// How long to wait at `now` before the next attempt is allowed.
    pub fn delay(&self, now: Instant) -> Option<Duration> {
        let last = self.last_attempt?;
        let elapsed = now.saturating_duration_since(last);
        self.interval
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}
