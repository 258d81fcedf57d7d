//! Exponential backoff retry policy for transient tracker failures.

use rand::Rng;
use std::time::Duration;

/// Retry policy configuration for exponential backoff.
///
/// # Examples
///
/// ```
/// use tracker_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(10), 2.0);
/// let delay = policy.calculate_delay(1);
/// assert!(delay >= Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// `delay(attempt) = min(initial * multiplier^attempt, max_delay)`, with
    /// jitter in `[0, 20%)` added on top (never below the un-jittered floor).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_secs = base_secs.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.0..0.2);
        Duration::from_secs_f64(capped_secs * (1.0 + jitter))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1_000), Duration::from_secs(10), 2.0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
