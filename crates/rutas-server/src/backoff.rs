//! Retry pacing for the graph reload loop.
//!
//! A failing reload (storage down, bad edge rows) should not be retried on
//! every tick or flood the log.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    retry_at: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            failures: 0,
            retry_at: None,
        }
    }

    pub fn ready(&self) -> bool {
        self.retry_at.map_or(true, |at| Instant::now() >= at)
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.failures = 0;
        self.retry_at = None;
    }

    /// Record a failure and return the delay before the next attempt.
    pub fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = with_jitter(self.delay_for(self.failures));
        self.retry_at = Some(Instant::now() + delay);
        delay
    }

    /// Base doubled once per failure, capped at `max`. No jitter.
    fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.min(31);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Adds up to 20% drawn from the clock's sub-second nanos.
fn with_jitter(delay: Duration) -> Duration {
    let spread_ms = delay.as_millis() as u64 / 5;
    if spread_ms == 0 {
        return delay;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    delay + Duration::from_millis(u64::from(nanos) % (spread_ms + 1))
}
