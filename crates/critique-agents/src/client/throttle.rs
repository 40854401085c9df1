//! Concurrency bound and rate-limit back-off around a model client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::warn;

use super::{CompletionRequest, ModelClient};
use crate::errors::{PipelineError, RetryCategory};

/// Longest single back-off wait.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Decorates a client with a max-in-flight semaphore and bounded
/// exponential back-off on `RateLimit` errors.
///
/// The permit is released while backing off so waiting calls do not hold
/// capacity. Errors outside `RetryCategory::RateLimit` pass through
/// untouched.
pub struct ThrottledClient {
    inner: Arc<dyn ModelClient>,
    permits: Arc<Semaphore>,
    max_retries: u32,
    backoff_base: Duration,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn ModelClient>, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            max_retries: RetryCategory::RateLimit
                .default_max_retries()
                .unwrap_or_default(),
            backoff_base: Duration::from_secs(1),
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Delay before retry number `attempt` (0-based). A server hint wins
    /// when it asks for longer.
    fn backoff_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exponential = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_BACKOFF);
        match hint {
            Some(h) => h.max(exponential).min(MAX_BACKOFF),
            None => exponential,
        }
    }
}

#[async_trait]
impl ModelClient for ThrottledClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        let mut attempt = 0;
        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| PipelineError::Cancelled("request limiter closed".into()))?;
                self.inner.complete(request).await
            };

            match result {
                Err(err)
                    if err.retry_category() == RetryCategory::RateLimit
                        && attempt < self.max_retries =>
                {
                    let delay = self.backoff_delay(attempt, err.retry_after());
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
