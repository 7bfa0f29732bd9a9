//! Zero-peer stall timer.
//!
//! A job that has seen zero peers for longer than the threshold is
//! auto-cancelled and frees its admission slot. Polls where the engine has
//! nothing to report (queued inside the engine) stop the clock.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallCheck {
    Healthy,
    /// Zero peers for longer than the threshold; carries the idle time.
    Stalled(Duration),
}

#[derive(Debug, Clone)]
pub struct StallTimer {
    threshold: Duration,
    last_seen_peers: Instant,
    last_tick: Instant,
}

impl StallTimer {
    /// Start the clock at `now` (job start counts as "last seen").
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_seen_peers: now,
            last_tick: now,
        }
    }

    /// Record one observation. Any peer resets the timer.
    pub fn observe(&mut self, peer_count: u32, now: Instant) -> StallCheck {
        self.last_tick = now;
        if peer_count > 0 {
            self.last_seen_peers = now;
            return StallCheck::Healthy;
        }
        let idle = now.saturating_duration_since(self.last_seen_peers);
        if idle > self.threshold {
            StallCheck::Stalled(idle)
        } else {
            StallCheck::Healthy
        }
    }

    /// The engine reported no status: time since the previous poll does not
    /// count towards the threshold.
    pub fn hold(&mut self, now: Instant) {
        let paused = now.saturating_duration_since(self.last_tick);
        self.last_seen_peers += paused;
        self.last_tick = now;
    }

    /// Start of the current idle stretch, excluding held time.
    pub fn last_seen_peers(&self) -> Instant {
        self.last_seen_peers
    }
}
