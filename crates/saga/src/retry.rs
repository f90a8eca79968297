//! Timeout and exponential backoff for ledger calls.

use std::future::Future;
use std::time::Duration;

use crate::services::RemoteError;

/// Bounds and backoff schedule for one logical ledger call.
///
/// Each attempt is cut off after `call_timeout`. Retryable failures are
/// retried up to `max_retries` times, sleeping `initial_backoff`,
/// `initial_backoff * multiplier`, ... capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn no_retries(call_timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            call_timeout,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Upper bound on one [`run`](Self::run) that spends every retry on
    /// timeouts.
    pub fn worst_case_duration(&self) -> Duration {
        let backoff: Duration = (0..self.max_retries).map(|retry| self.backoff(retry)).sum();
        self.call_timeout * (self.max_retries + 1) + backoff
    }

    /// Runs `op` until it succeeds, fails terminally, or retries run out.
    ///
    /// `op` receives the zero-based attempt number. An attempt that outlives
    /// `call_timeout` is dropped and counts as [`RemoteError::Timeout`].
    pub async fn run<F, Fut, T>(&self, operation: &'static str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.call_timeout, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout(self.call_timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    metrics::counter!("confirmation_retries_total", "operation" => operation)
                        .increment(1);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "ledger call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(operation, attempts = attempt + 1, error = %err, "ledger call failed");
                    return Err(err);
                }
            }
        }
    }
}
