//! Identify pacing
//!
//! The gateway accepts one IDENTIFY per interval for a token. Each fresh
//! identify takes the next free slot; resumes are not paced.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct IdentifyThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl IdentifyThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Claim the next identify slot and return how long to wait for it
    pub(crate) fn next_slot(&mut self) -> Duration {
        let now = Instant::now();
        let slot = match self.last {
            Some(last) => (last + self.interval).max(now),
            None => now,
        };
        self.last = Some(slot);
        slot - now
    }
}
