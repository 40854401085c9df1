//! Model client boundary
//!
//! Every reasoning step in the pipeline goes through [`ModelClient`]: one
//! system instruction plus one user message in, completion text out. No
//! state is kept between calls; callers resend any history they need.
//!
//! - [`AnthropicClient`] talks to the Messages API over HTTP.
//! - [`ThrottledClient`] wraps any client with a max-in-flight bound and
//!   exponential back-off on rate limits.

pub mod anthropic;
pub mod throttle;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

pub use anthropic::AnthropicClient;
pub use throttle::ThrottledClient;

/// Sampling options for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_output_tokens: u32,
}

/// One stateless completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub options: CompletionOptions,
}

impl CompletionRequest {
    pub fn new(
        system: impl Into<String>,
        prompt: impl Into<String>,
        options: CompletionOptions,
    ) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            options,
        }
    }
}

/// Text-completion backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one completion and return its text.
    ///
    /// Fails with `Upstream` on service errors, `RateLimit` on HTTP 429 and
    /// `EmptyResponse` when the payload carries no text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError>;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        (**self).complete(request).await
    }
}
