// src/retry.rs
//! Retry policy + explicit retry loop, kept apart from the HTTP calls they wrap.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::failure::Failure;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Fixed-delay policy. Decisions depend only on the failure kind and the attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed()
    }
}

impl RetryPolicy {
    /// 3 retries (4 attempts in total), 1 s apart.
    pub fn fixed() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }

    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// `attempts_made` counts attempts already finished, including the one that produced `failure`.
    pub fn should_retry(&self, failure: &Failure, attempts_made: u32) -> RetryDecision {
        if !failure.is_retryable() || attempts_made > self.max_retries {
            return RetryDecision::stop();
        }
        RetryDecision {
            retry: true,
            delay: self.delay,
        }
    }
}

/// Drive `op` until it succeeds, fails with a non-retryable failure, or the policy gives up.
/// On exhaustion the last failure is returned as-is.
pub async fn run<T, F, Fut>(policy: &RetryPolicy, source: &'static str, mut op: F) -> Result<T, Failure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let mut attempts_made: u32 = 0;
    loop {
        let result = op().await;
        attempts_made += 1;

        let failure = match result {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        let decision = policy.should_retry(&failure, attempts_made);
        if !decision.retry {
            if failure.is_retryable() {
                warn!(source, attempts = attempts_made, error = %failure, "retries exhausted");
            } else {
                debug!(source, kind = failure.kind(), "not retrying");
            }
            return Err(failure);
        }

        counter!("downstream_retries_total", "source" => source).increment(1);
        warn!(
            source,
            attempt = attempts_made,
            delay_ms = decision.delay.as_millis() as u64,
            error = %failure,
            "retrying after server error"
        );
        tokio::time::sleep(decision.delay).await;
    }
}
