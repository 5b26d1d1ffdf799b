use std::time::Duration;

/// Attempts per image download.
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Backoff step; attempt `n` waits `n * step` before the next one.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(1000);

/// Bounded retry with linearly increasing backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::linear(DEFAULT_DOWNLOAD_ATTEMPTS, DEFAULT_BACKOFF_STEP)
    }
}

impl RetryPolicy {
    /// A policy with at least one attempt.
    pub const fn linear(max_attempts: u32, backoff_step: Duration) -> Self {
        RetryPolicy {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            backoff_step,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempt numbers, starting at 1.
    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts
    }

    /// Delay after the failed attempt `attempt` (1-based), or `None` when it
    /// was the last one.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.backoff_step.saturating_mul(attempt))
    }
}
