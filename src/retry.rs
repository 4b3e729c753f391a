//! Bounded retry with exponential backoff.
//!
//! The executor only decides *when* to try again. Whether a failure is worth
//! another attempt is decided by the error itself through [`Retryable`], so
//! client errors short-circuit without consuming the retry budget.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Classification of a failure as transient or terminal.
pub trait Retryable {
  fn is_retryable(&self) -> bool;
}

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
  /// Total attempts including the first one
  pub max_attempts: u32,
  /// Delay before the second attempt
  pub initial_delay: Duration,
  /// Upper bound for any single delay
  pub max_delay: Duration,
  /// Multiplier applied to the delay after each failed attempt
  pub factor: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      initial_delay: Duration::from_millis(1000),
      max_delay: Duration::from_millis(10_000),
      factor: 2.0,
    }
  }
}

impl RetryPolicy {
  /// A policy that makes a single attempt.
  pub fn no_retry() -> Self {
    Self {
      max_attempts: 1,
      ..Self::default()
    }
  }

  /// Delay to wait before attempt number `attempt` (1-based).
  ///
  /// `min(initial_delay * factor^(attempt - 2), max_delay)`; zero for the first attempt.
  pub fn delay_before(&self, attempt: u32) -> Duration {
    if attempt < 2 {
      return Duration::ZERO;
    }
    let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
    let delay_ms = self.initial_delay.as_millis() as f64 * self.factor.powi(exponent);
    let max_ms = self.max_delay.as_millis() as f64;
    Duration::from_millis(delay_ms.min(max_ms) as u64)
  }

  /// Run `operation` until it succeeds, fails with a non-retryable error,
  /// or `max_attempts` is exhausted. Returns the last error on failure.
  ///
  /// Waiting suspends only the calling task.
  pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
  where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      match operation().await {
        Ok(value) => return Ok(value),
        Err(err) if attempt >= max_attempts || !err.is_retryable() => return Err(err),
        Err(err) => {
          attempt += 1;
          let delay = self.delay_before(attempt);
          warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "request failed, retrying"
          );
          tokio::time::sleep(delay).await;
        }
      }
    }
  }
}
