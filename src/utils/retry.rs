use anyhow::{anyhow, Error, Result};
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::utils::strip_html;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff floor. No two attempts are ever closer than this.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential: f64,
    #[serde(skip, default = "default_retryable")]
    pub retryable: fn(&Error) -> bool,
}

fn always_retry(_: &Error) -> bool {
    true
}

fn default_retryable() -> fn(&Error) -> bool {
    always_retry
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            min_delay_ms: 5_000,
            max_delay_ms: 60_000,
            exponential: 2.0,
            retryable: always_retry,
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Exponential backoff with full jitter, clamped to `[min_delay_ms, max_delay_ms]`.
    /// https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/
    fn next_delay(&self, delay: u64) -> u64 {
        let ceiling = (delay as f64 * self.exponential) as u64;
        let jittered = (fastrand::f64() * ceiling as f64) as u64;
        jittered.clamp(self.min_delay_ms, self.max_delay_ms.max(self.min_delay_ms))
    }
}

/// Emitted before every retry (not before the first attempt).
#[derive(Debug, Clone, Copy)]
pub struct RetryAttempt<'a> {
    /// 1 for the first retry.
    pub attempt: u32,
    pub context: &'a str,
    pub delay_ms: u64,
}

pub async fn retry<F, Fut, T>(operation: F, config: &RetryConfig, context: &str) -> Result<T, Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, Error>>,
{
    retry_observed(operation, config, context, |_| {}).await
}

pub async fn retry_observed<F, Fut, T, O>(
    operation: F,
    config: &RetryConfig,
    context: &str,
    mut on_retry: O,
) -> Result<T, Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, Error>>,
    O: FnMut(RetryAttempt<'_>),
{
    let mut attempt = 1;
    let mut delay = config.min_delay_ms;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= config.max_attempts() || !(config.retryable)(&e) {
                    error!(
                        "Operation '{}' failed after {} attempts. Final error: {}",
                        context, attempt, e
                    );
                    return Err(anyhow!(strip_html(&format!("{e:#}")))
                        .context(format!("{} failed after {} attempts", context, attempt)));
                }

                warn!(
                    "Retrying {} for {} (attempt {}/{} failed: {}). Next attempt in {}ms...",
                    attempt,
                    context,
                    attempt,
                    config.max_attempts(),
                    strip_html(&e.to_string()),
                    delay
                );
                on_retry(RetryAttempt {
                    attempt,
                    context,
                    delay_ms: delay,
                });

                sleep(Duration::from_millis(delay)).await;

                delay = config.next_delay(delay);
                attempt += 1;
            }
        }
    }
}
