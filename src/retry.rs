//! Fixed-attempt retry around API calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;

/// How often, and how patiently, transient API failures are retried.
///
/// Only errors for which [`ProviderError::is_retryable`] holds are retried;
/// everything else is returned on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.run_if(operation, ProviderError::is_retryable, call).await
    }

    /// Like [`RetryPolicy::run`] for calls that are not idempotent. Only
    /// failures the API rejected before acting on are retried.
    pub async fn run_non_idempotent<T, F, Fut>(
        &self,
        operation: &str,
        call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.run_if(operation, ProviderError::is_safe_to_resend, call).await
    }

    async fn run_if<T, F, Fut>(
        &self,
        operation: &str,
        retryable: fn(&ProviderError) -> bool,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if retryable(&err) && attempt < max_attempts => {
                    warn!(
                        operation = %operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Transient API failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }
}
