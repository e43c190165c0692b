//! Retry with exponential backoff and jitter for throttled completion calls.
//!
//! The delay schedule is a pure function of the attempt number and a jitter
//! sample, so it can be tested without touching the network or the RNG.

use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

use super::{CompletionModel, CompletionRequest, LlmError};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 means 4 calls in total).
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempt` (0-based):
    /// `base_delay * 2^attempt + jitter`.
    pub fn delay(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .saturating_add(jitter)
    }

    /// Uniform sample in `[0, max_jitter)`.
    pub fn sample_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// Calls the model, retrying only throttling errors according to `policy`.
/// Every failed attempt is logged with its upstream detail.
pub async fn complete_with_retry(
    model: &dyn CompletionModel,
    request: &CompletionRequest<'_>,
    policy: &RetryPolicy,
) -> Result<String, LlmError> {
    let mut attempt = 0;
    loop {
        match model.complete(request).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_throttled() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt, policy.sample_jitter());
                warn!(
                    "LLM attempt {} throttled, retrying in {}ms: {e}",
                    attempt + 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("LLM attempt {} failed: {e}", attempt + 1);
                return Err(e);
            }
        }
    }
}
