//! Retry with exponential backoff for transient LLM failures.
//!
//! Wraps a fallible operation and re-executes it per policy. Only errors
//! classified retriable by [`LlmError::is_retriable`] are re-attempted;
//! anything else propagates immediately. The backoff sleep suspends only
//! the calling thread, so unrelated concurrent requests are unaffected.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::QaConfig;
use crate::error::QaError;
use crate::llm::LlmError;

/// Configurable retry policy for LLM calls.
///
/// The policy is a plain value object constructed per call (usually via
/// [`RetryPolicy::from_config`]), so two concurrent requests can run with
/// different retry settings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
}

impl RetryPolicy {
    /// Creates a new policy.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Total attempts including the first
    /// * `base_delay` - Delay before the second attempt
    /// * `max_delay` - Ceiling on any single delay
    /// * `exponential_base` - Multiplier applied per attempt
    /// * `jitter` - Randomly shorten each delay by up to 25%
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
        jitter: bool,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            exponential_base,
            jitter,
        }
    }

    /// Creates a policy from the retry knobs in `config`.
    #[must_use]
    pub fn from_config(config: &QaConfig) -> Self {
        Self::new(
            config.max_retry_attempts,
            Duration::from_secs_f64(config.retry_base_delay),
            Duration::from_secs_f64(config.retry_max_delay),
            config.retry_exponential_base,
            config.retry_jitter,
        )
    }

    /// Backoff delay for a given 1-based attempt number.
    ///
    /// Computes `min(max_delay, base_delay * exponential_base^(attempt - 1))`,
    /// then shortens it by a uniform factor in `[0.75, 1.0]` when jitter is
    /// enabled. Jitter only ever reduces the delay; the computed ceiling is
    /// never exceeded.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let uncapped = self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent as i32);
        let mut delay = uncapped.min(self.max_delay.as_secs_f64());

        if self.jitter {
            delay *= rand::thread_rng().gen_range(0.75..=1.0);
        }

        Duration::from_secs_f64(delay)
    }

    /// Runs `operation`, re-attempting transient failures per this policy.
    ///
    /// State machine: attempt 1 runs immediately; a retriable failure
    /// sleeps for [`RetryPolicy::delay_for`] and re-attempts, until
    /// `max_attempts` is reached.
    ///
    /// # Errors
    ///
    /// Returns `QaError::Client` for a non-retriable failure (the
    /// operation is not re-attempted) and `QaError::RetryExhausted` when
    /// the final attempt still failed with a retriable error.
    pub fn run<T, F>(&self, mut operation: F) -> Result<T, QaError>
    where
        F: FnMut() -> Result<T, LlmError>,
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "LLM call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retriable() => {
                    debug!(error = %error, "non-retriable error, failing immediately");
                    return Err(QaError::Client(error));
                }
                Err(error) if attempt >= self.max_attempts => {
                    warn!(attempts = attempt, error = %error, "all retry attempts exhausted");
                    return Err(QaError::RetryExhausted {
                        attempts: attempt,
                        source: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient error"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QaConfig::default())
    }
}
