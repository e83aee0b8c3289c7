//! Exponential backoff for model calls.
//!
//! The adapter itself never retries; callers that want retries wrap the
//! call with [`execute_with_retry_async`] and decide which errors qualify.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::VisionError;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(with = "crate::serde_millis")]
    pub base_delay: Duration,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(with = "crate::serde_millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Spread delays by ±25%.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(VisionError::InvalidConfig(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(VisionError::InvalidConfig(
                "retry.base_delay must not exceed retry.max_delay".into(),
            ));
        }
        Ok(())
    }

    /// Upper bound on the total time spent sleeping between attempts,
    /// jitter included.
    pub fn worst_case_delay(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| {
                let nominal = self.base_delay.as_millis() as f64
                    * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
                let capped = nominal.min(self.max_delay.as_millis() as f64) as u64;
                let jitter = if self.jitter { capped / 4 } else { 0 };
                Duration::from_millis(capped + jitter)
            })
            .sum()
    }

    /// Delay before retry number `attempt` (0 means the first try, no delay).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential = self.base_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = exponential.min(self.max_delay.as_millis() as f64) as u64;

        if self.jitter {
            let jitter_range = delay_ms / 4;
            if jitter_range > 0 {
                let offset = fastrand::u64(0..jitter_range * 2);
                return Duration::from_millis(delay_ms - jitter_range + offset);
            }
        }

        Duration::from_millis(delay_ms)
    }
}

/// Outcome of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryResult<T, E> {
    /// Success, or the last error seen.
    pub result: Result<T, E>,
    /// Attempts made; 1 means the first try decided it.
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// the retry budget is spent.
///
/// # Example
/// ```
/// use vision::retry::{execute_with_retry_async, RetryConfig};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = RetryConfig::default()
///     .with_max_retries(3)
///     .with_base_delay(Duration::from_millis(1));
///
/// let outcome = execute_with_retry_async(
///     &config,
///     |attempt| async move {
///         if attempt == 0 { Err("transient") } else { Ok("done") }
///     },
///     |_err| true,
/// )
/// .await;
///
/// assert_eq!(outcome.attempts, 2);
/// assert_eq!(outcome.into_result(), Ok("done"));
/// # }
/// ```
pub async fn execute_with_retry_async<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            Err(err) => {
                if attempt >= config.max_retries || !should_retry(&err) {
                    return RetryResult {
                        result: Err(err),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                    };
                }
                attempt += 1;
                let delay = config.calculate_delay(attempt);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }
    }
}
