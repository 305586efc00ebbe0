//! Reconnect backoff
//!
//! Exponential with full jitter: `delay = random(0, min(cap, base * 2^attempt))`.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub(crate) fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            attempt: 0,
        }
    }

    /// Upper bound of the next delay
    pub(crate) fn ceiling(&self) -> Duration {
        let exp = self
            .base_ms
            .saturating_mul(1u64.checked_shl(self.attempt).unwrap_or(u64::MAX));
        Duration::from_millis(exp.min(self.max_ms))
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let capped = self.ceiling().as_millis() as u64;
        let jittered = if capped == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=capped)
        };
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(jittered)
    }

    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Random 1-5 s pause required before answering an invalid session
pub(crate) fn invalid_session_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(1000..=5000))
}
