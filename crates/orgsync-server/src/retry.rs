//! Retrying operations that fail on transient collaborator errors.

use std::{future::Future, time::Duration};

use orgsync_core::Transient;

/// How often an operation is attempted before its last error is returned.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
  /// Total attempts, including the first.
  pub max_attempts: u32,
  /// Pause between attempts.
  pub delay:        Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_attempts: 5, delay: Duration::from_secs(10) }
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, delay: Duration) -> Self {
    Self { max_attempts, delay }
  }

  /// Whether a failed attempt (1-based) should be followed by another.
  pub fn should_retry<E: Transient>(&self, attempt: u32, error: &E) -> bool {
    attempt < self.max_attempts && error.is_transient()
  }

  /// Run `f` until it succeeds, fails with a non-transient error, or the
  /// attempts are used up.
  pub async fn execute<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, E>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
  {
    let mut attempt: u32 = 1;
    loop {
      match f().await {
        Ok(value) => return Ok(value),
        Err(error) if self.should_retry(attempt, &error) => {
          tracing::warn!(
            operation,
            attempt,
            max_attempts = self.max_attempts,
            %error,
            "transient failure, retrying"
          );
          tokio::time::sleep(self.delay).await;
          attempt += 1;
        }
        Err(error) => {
          if error.is_transient() {
            tracing::error!(operation, attempts = attempt, %error, "giving up");
          }
          return Err(error);
        }
      }
    }
  }
}
