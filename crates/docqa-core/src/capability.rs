//! Pluggable model capabilities and the retry discipline around them.
//!
//! The core never talks to a model directly. It consumes two black boxes:
//!
//! - [`Embedder`] maps text to a fixed-length vector.
//! - [`AnswerGenerator`] turns a prompt into answer text.
//!
//! Both are assumed network-bound. Every call goes through [`with_retry`],
//! which bounds each attempt by a timeout, retries [retryable] failures
//! with exponential backoff, and never runs past the caller's deadline.
//! Dropping the returned future cancels the in-flight attempt.
//!
//! [retryable]: crate::error::QaError::is_retryable

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use crate::error::{QaError, Result};

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Output dimensionality; every returned vector has this length.
    fn dims(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order. Backends with a batch API
    /// should override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Trait for answer generation backends.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Produce answer text for a fully built prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No retries; one attempt bounded by `attempt_timeout`.
    pub fn once(attempt_timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            attempt_timeout,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): `base × 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run a capability call under `policy`, stopping at `deadline` if given.
///
/// # Errors
///
/// - [`QaError::CapabilityTimeout`] when an attempt or the deadline expires
///   and no retries remain.
/// - The last error returned by `op` once retries are exhausted, or the
///   first non-retryable error.
pub async fn with_retry<T, F, Fut>(
    capability: &'static str,
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let budget = match deadline {
            Some(d) => {
                let left = d.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Err(QaError::CapabilityTimeout {
                        capability,
                        after_ms: policy.attempt_timeout.as_millis() as u64,
                    });
                }
                left.min(policy.attempt_timeout)
            }
            None => policy.attempt_timeout,
        };

        let err = match tokio::time::timeout(budget, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => QaError::CapabilityTimeout {
                capability,
                after_ms: budget.as_millis() as u64,
            },
        };

        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }

        attempt += 1;
        let delay = policy.backoff(attempt);
        if let Some(d) = deadline {
            if Instant::now() + delay >= d {
                return Err(err);
            }
        }
        warn!(capability, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying capability call");
        tokio::time::sleep(delay).await;
    }
}
