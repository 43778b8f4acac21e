//! Backoff scheduling for retryable operations.

use crate::workflow::Control;
use conflux_core::RetryPolicy;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Drives the attempt counter for one retryable operation.
///
/// The policy itself is stateless; a fresh schedule is created per
/// operation so every connect/validate/run starts at attempt 1.
pub(crate) struct RetrySchedule<'a> {
    policy: &'a RetryPolicy,
    control: &'a Control,
    attempt: u32,
}

impl<'a> RetrySchedule<'a> {
    pub(crate) fn new(policy: &'a RetryPolicy, control: &'a Control) -> Self {
        Self {
            policy,
            control,
            attempt: 1,
        }
    }

    /// The attempt currently in progress (1-based).
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Sleeps the backoff delay and advances to the next attempt.
    ///
    /// Returns `false` without sleeping when attempts are exhausted; the
    /// caller then propagates the last error unchanged. A cancellation
    /// request interrupts the sleep; the caller's cancellation checkpoint
    /// observes the flag on the next loop iteration.
    pub(crate) async fn backoff(&mut self, operation: &str) -> bool {
        if self.attempt >= self.policy.max_attempts() {
            return false;
        }
        self.attempt += 1;
        if let Some(delay) = self.policy.delay_before_attempt(self.attempt) {
            let delay = apply_jitter(self.policy, delay);
            debug!(
                operation,
                attempt = self.attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                "retry scheduled"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.control.cancelled() => {
                    debug!(operation, "retry delay interrupted by cancellation");
                }
            }
        }
        true
    }
}

/// Adds uniform random jitter in `[0, delay)` when the policy asks for it.
fn apply_jitter(policy: &RetryPolicy, delay: Duration) -> Duration {
    if !policy.jitter() || delay.is_zero() {
        return delay;
    }
    let millis = delay.as_millis() as u64;
    delay + Duration::from_millis(rand::rng().random_range(0..millis))
}
