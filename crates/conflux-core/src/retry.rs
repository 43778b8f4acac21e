//! Retry policy with exponential backoff.

use std::time::Duration;

/// Error returned when [`RetryPolicy`] parameters are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicyError(pub &'static str);

impl std::fmt::Display for RetryPolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RetryPolicyError {}

/// Exponential-backoff retry parameters for a single retryable operation.
///
/// The delay before attempt `n` (for `n >= 2`) is
/// `min(base_delay * multiplier^(n-2), max_delay)`, so the sequence is
/// non-decreasing up to the ceiling. The policy is stateless: every
/// operation it wraps starts a fresh attempt counter.
///
/// # Examples
///
/// ```
/// use conflux_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(
///     4,
///     Duration::from_secs(1),
///     2,
///     Duration::from_secs(4),
/// ).unwrap();
///
/// assert_eq!(policy.delay_before_attempt(2), Some(Duration::from_secs(1)));
/// assert_eq!(policy.delay_before_attempt(3), Some(Duration::from_secs(2)));
/// assert_eq!(policy.delay_before_attempt(4), Some(Duration::from_secs(4)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: u32,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy, validating its parameters.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: u32,
        max_delay: Duration,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError("max_attempts must be at least 1"));
        }
        if multiplier == 0 {
            return Err(RetryPolicyError("multiplier must be greater than 0"));
        }
        if multiplier > 10 {
            return Err(RetryPolicyError(
                "multiplier must be 10 or less to avoid overflow",
            ));
        }
        if max_delay < base_delay {
            return Err(RetryPolicyError("max_delay must be >= base_delay"));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            multiplier,
            max_delay,
            jitter: false,
        })
    }

    /// A policy that attempts the operation exactly once.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Enables uniform random jitter on top of each computed delay.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether jitter is enabled.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Computes the backoff delay slept before attempt `attempt` (1-based).
    ///
    /// Returns `None` for the first attempt and for attempts beyond
    /// `max_attempts`. Jitter is not included; callers sample it themselves.
    pub fn delay_before_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 || attempt > self.max_attempts {
            return None;
        }
        let factor = (self.multiplier as u64)
            .checked_pow(attempt - 2)
            .unwrap_or(u64::MAX);
        let millis = (self.base_delay.as_millis() as u64)
            .checked_mul(factor)
            .unwrap_or(u64::MAX);
        Some(Duration::from_millis(
            millis.min(self.max_delay.as_millis() as u64),
        ))
    }
}
