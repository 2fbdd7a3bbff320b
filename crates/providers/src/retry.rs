//! Provider retry: bounded re-attempts on transient failures.
//!
//! Wraps a single provider. Rate limits, timeouts, network failures, and 5xx
//! responses are retried with doubling backoff; anything else returns at once.

use async_trait::async_trait;
use ragbridge_config::RetryConfig;
use ragbridge_core::error::ProviderError;
use ragbridge_core::prompt::PromptShape;
use ragbridge_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A provider that retries its inner provider on transient errors.
pub struct RetryingProvider {
    inner: Arc<dyn ragbridge_core::Provider>,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn ragbridge_core::Provider>, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(inner: Arc<dyn ragbridge_core::Provider>, config: &RetryConfig) -> Self {
        Self::new(inner, config.max_attempts, Duration::from_millis(config.backoff_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl ragbridge_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn prompt_shape(&self) -> PromptShape {
        self.inner.prompt_shape()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut delay = self.backoff;
        let mut attempt = 1;

        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Provider recovered after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        self.inner.embed(request).await
    }
}
