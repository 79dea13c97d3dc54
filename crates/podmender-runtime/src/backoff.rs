use crate::error::{Result, RuntimeError};
use std::time::Duration;

/// Longest delay accepted between two deletes of the same pod
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Exponential delay between repair attempts for the same pod
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first attempt
    pub initial: Duration,
    /// Upper bound for any delay
    pub max: Duration,
    /// Growth factor per attempt
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(30),
            max: Duration::from_secs(300),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait after attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map_or(self.max, |d| d.min(self.max))
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial.is_zero() {
            return Err(RuntimeError::invalid_config(
                "backoff initial delay is zero",
                "A zero delay re-issues deletes on every observation. Use at least one second",
            ));
        }
        if self.max > MAX_BACKOFF {
            return Err(RuntimeError::invalid_config(
                format!(
                    "backoff max ({:?}) exceeds the {:?} limit",
                    self.max, MAX_BACKOFF
                ),
                "Lower --backoff-max-secs to at most 86400",
            ));
        }
        if self.max < self.initial {
            return Err(RuntimeError::invalid_config(
                format!(
                    "backoff max ({:?}) is shorter than initial delay ({:?})",
                    self.max, self.initial
                ),
                "Raise --backoff-max-secs or lower --backoff-initial-secs",
            ));
        }
        Ok(())
    }
}
