//! Timeout and retry wrapper around individual API calls.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};

/// Runs requests with a per-attempt timeout and bounded exponential backoff.
///
/// Only transient failures (timeouts, connection errors, 5xx) are retried. The executor
/// never touches caches or session state; what to do with a final error is the caller's
/// call.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
  max_attempts: u32,
  base_delay: Duration,
  max_delay: Duration,
  timeout: Duration,
  jitter: bool,
}

impl RequestExecutor {
  pub fn new(retry: &RetryConfig, timeout: Duration) -> Self {
    Self {
      max_attempts: retry.max_attempts.max(1),
      base_delay: Duration::from_millis(retry.base_delay_ms),
      max_delay: Duration::from_millis(retry.max_delay_ms),
      timeout,
      jitter: retry.jitter,
    }
  }

  /// A copy of this executor that makes exactly one attempt.
  ///
  /// Used for non-idempotent calls such as checkout.
  pub fn single_attempt(&self) -> Self {
    Self {
      max_attempts: 1,
      ..self.clone()
    }
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Delay before attempt `attempt` (1-based). The first attempt is immediate.
  ///
  /// `min(base * 2^(attempt - 2), max)` for attempt >= 2.
  pub fn backoff_delay(&self, attempt: u32) -> Duration {
    if attempt < 2 {
      return Duration::ZERO;
    }
    let exponent = (attempt - 2).min(31);
    self
      .base_delay
      .checked_mul(1u32 << exponent)
      .map_or(self.max_delay, |d| d.min(self.max_delay))
  }

  fn jittered(&self, delay: Duration) -> Duration {
    if !self.jitter || delay.is_zero() {
      return delay;
    }
    delay.mul_f64(rand::rng().random_range(0.5..=1.0))
  }

  /// Run `request` until it succeeds, fails terminally, or attempts run out.
  pub async fn execute<T, F, Fut>(&self, mut request: F) -> SyncResult<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
  {
    let mut attempt = 1;
    loop {
      let outcome = match tokio::time::timeout(self.timeout, request()).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout),
      };

      match outcome {
        Ok(value) => return Ok(value),
        Err(err) if err.is_retryable() && attempt < self.max_attempts => {
          attempt += 1;
          let delay = self.jittered(self.backoff_delay(attempt));
          debug!(attempt, ?delay, error = %err, "Retrying request");
          tokio::time::sleep(delay).await;
        }
        Err(err) => {
          if err.is_retryable() {
            warn!(attempts = attempt, error = %err, "Request failed after retries");
          }
          return Err(err);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn executor(max_attempts: u32) -> RequestExecutor {
    let retry = RetryConfig {
      max_attempts,
      base_delay_ms: 1,
      max_delay_ms: 4,
      jitter: false,
    };
    RequestExecutor::new(&retry, Duration::from_millis(200))
  }

  #[test]
  fn test_backoff_schedule() {
    let retry = RetryConfig {
      max_attempts: 6,
      base_delay_ms: 500,
      max_delay_ms: 3000,
      jitter: false,
    };
    let exec = RequestExecutor::new(&retry, Duration::from_secs(30));
    assert_eq!(exec.backoff_delay(1), Duration::ZERO);
    assert_eq!(exec.backoff_delay(2), Duration::from_millis(500));
    assert_eq!(exec.backoff_delay(3), Duration::from_millis(1000));
    assert_eq!(exec.backoff_delay(4), Duration::from_millis(2000));
    assert_eq!(exec.backoff_delay(5), Duration::from_millis(3000));
    assert_eq!(exec.backoff_delay(60), Duration::from_millis(3000));
  }

  #[test]
  fn test_jitter_stays_within_bounds() {
    let retry = RetryConfig {
      max_attempts: 3,
      base_delay_ms: 1000,
      max_delay_ms: 1000,
      jitter: true,
    };
    let exec = RequestExecutor::new(&retry, Duration::from_secs(30));
    for _ in 0..50 {
      let d = exec.jittered(exec.backoff_delay(2));
      assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1000));
    }
  }

  #[tokio::test]
  async fn test_retries_transient_then_succeeds() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result = executor(3)
      .execute(move || async move {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
          Err(SyncError::from_status(503, None))
        } else {
          Ok(7)
        }
      })
      .await;

    assert_eq!(result, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_returns_last_error_after_exhaustion() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: SyncResult<()> = executor(3)
      .execute(move || async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Err(SyncError::Server {
          status: 500,
          message: Some(format!("attempt {}", n + 1)),
        })
      })
      .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(
      result,
      Err(SyncError::Server {
        status: 500,
        message: Some("attempt 3".into())
      })
    );
  }

  #[tokio::test]
  async fn test_terminal_error_is_not_retried() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: SyncResult<()> = executor(5)
      .execute(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(SyncError::from_status(401, None))
      })
      .await;

    assert!(matches!(result, Err(SyncError::Unauthorized { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_timeout_is_retryable() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let retry = RetryConfig {
      max_attempts: 2,
      base_delay_ms: 1,
      max_delay_ms: 1,
      jitter: false,
    };
    let exec = RequestExecutor::new(&retry, Duration::from_millis(20));

    let result = exec
      .execute(move || async move {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
          tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok("done")
      })
      .await;

    assert_eq!(result, Ok("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_single_attempt() {
    let calls = AtomicU32::new(0);
    let counter = &calls;
    let result: SyncResult<()> = executor(4)
      .single_attempt()
      .execute(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(SyncError::Timeout)
      })
      .await;

    assert_eq!(result, Err(SyncError::Timeout));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
