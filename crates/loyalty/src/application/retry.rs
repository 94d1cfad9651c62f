//! Retry Envelope
//!
//! Wraps every handler→storage call with a deadline and Fibonacci-backoff
//! retries. Errors in the closed domain set are control signals and pass
//! through immediately; only infrastructural failures are retried.

use std::future::Future;
use std::time::Duration;

use crate::error::{LoyaltyError, LoyaltyResult};

/// Deadline + bounded-retry policy applied uniformly to storage operations
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            timeout,
        }
    }

    /// Run `op` under this policy
    ///
    /// `op` is re-invoked for each attempt. Exhausting the retries surfaces
    /// the last underlying error; an elapsed deadline surfaces `Deadline`.
    pub async fn run<T, F, Fut>(&self, op: F) -> LoyaltyResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LoyaltyResult<T>>,
    {
        tokio::time::timeout(self.timeout, self.attempts(op))
            .await
            .unwrap_or(Err(LoyaltyError::Deadline))
    }

    async fn attempts<T, F, Fut>(&self, op: F) -> LoyaltyResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = LoyaltyResult<T>>,
    {
        let mut backoff = fibonacci(self.base_delay);
        let mut retries = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_domain() => return Err(err),
                Err(err) => {
                    if retries >= self.max_retries {
                        return Err(err);
                    }
                    retries += 1;
                    let delay = backoff.next().unwrap_or(self.base_delay);
                    tracing::warn!(
                        error = %err,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying storage operation"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Fibonacci delay sequence: base, base, 2*base, 3*base, 5*base, ...
fn fibonacci(base: Duration) -> impl Iterator<Item = Duration> {
    let mut prev = 0u32;
    let mut cur = 1u32;
    std::iter::from_fn(move || {
        let next = prev.saturating_add(cur);
        prev = cur;
        cur = next;
        Some(base.saturating_mul(prev))
    })
}
