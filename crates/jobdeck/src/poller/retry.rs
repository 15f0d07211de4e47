use std::time::Duration;

/// Backoff schedule for status fetches that fail to reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive transport failures after which polling gives up.
    pub max_consecutive_failures: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next fetch after `failures` consecutive failures
    /// (1-based), capped at `max_backoff`.
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(64) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_consecutive_failures
    }
}
