//! Adaptive poll timeout for reverse-connect endpoints.

use std::time::Duration;

use diag_config::PollTimeouts;

/// Per-endpoint poll timeout.
///
/// A connected endpoint rests at `max`. The first failure of a streak drops
/// to `min` so a restarted monitor is found quickly; each further failure
/// multiplies by `falloff`, always clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollBackoff {
    min: Duration,
    max: Duration,
    falloff: f64,
    current: Duration,
    failing: bool,
}

impl PollBackoff {
    /// Creates a backoff starting at `min`. `max` is raised to `min` and a
    /// falloff below one is treated as one.
    #[must_use]
    pub fn new(min: Duration, max: Duration, falloff: f64) -> Self {
        let max = max.max(min);
        let falloff = if falloff.is_finite() && falloff >= 1.0 {
            falloff
        } else {
            1.0
        };
        Self {
            min,
            max,
            falloff,
            current: min,
            failing: false,
        }
    }

    /// Timeout for the next poll.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Records a successful connection.
    pub fn record_success(&mut self) {
        self.current = self.max;
        self.failing = false;
    }

    /// Records a failed connection attempt.
    pub fn record_failure(&mut self) {
        if self.failing {
            self.current = self
                .current
                .mul_f64(self.falloff)
                .clamp(self.min, self.max);
        } else {
            self.current = self.min;
            self.failing = true;
        }
    }
}

impl From<PollTimeouts> for PollBackoff {
    fn from(timeouts: PollTimeouts) -> Self {
        Self::new(timeouts.min, timeouts.max, timeouts.falloff)
    }
}
