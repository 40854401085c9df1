//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CompletionRequest, ModelClient};
use crate::config::AnalysisConfig;
use crate::errors::PipelineError;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// HTTP 529: the API is temporarily overloaded. Treated like a 429.
const STATUS_OVERLOADED: u16 = 529;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Client for `POST {base_url}/v1/messages`.
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PipelineError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PipelineError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.options.max_output_tokens,
            "temperature": request.options.temperature,
            "system": request.system,
            "messages": [{
                "role": "user",
                "content": request.prompt
            }]
        });

        debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            max_tokens = request.options.max_output_tokens,
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == STATUS_OVERLOADED {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(PipelineError::RateLimit { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upstream(format!(
                "Claude API error ({}): {}",
                status, body
            )));
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Upstream(format!("malformed response payload: {e}")))?;

        if payload.stop_reason.as_deref() == Some("max_tokens") {
            warn!(
                max_tokens = request.options.max_output_tokens,
                "Completion truncated at output token limit"
            );
        }

        let text = payload
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CompletionOptions;

    fn config_for(server: &mockito::Server) -> AnalysisConfig {
        AnalysisConfig {
            api_key: "sk-test".into(),
            base_url: server.url(),
            model: "claude-test".into(),
            ..AnalysisConfig::default()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            "You are a reviewer.",
            "Review this.",
            CompletionOptions {
                temperature: 0.0,
                max_output_tokens: 300,
            },
        )
    }

    #[tokio::test]
    async fn returns_text_of_first_content_blocks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "claude-test",
                "max_tokens": 300,
                "system": "You are a reviewer."
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content":[{"type":"text","text":"Looks "},{"type":"text","text":"fine."}],"stop_reason":"end_turn"}"#,
            )
            .create_async()
            .await;

        let client = AnthropicClient::new(&config_for(&server)).unwrap();
        let text = client.complete(&request()).await.unwrap();
        assert_eq!(text, "Looks fine.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_429_maps_to_rate_limit_with_hint() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_header("retry-after", "12")
            .with_body(r#"{"type":"error"}"#)
            .create_async()
            .await;

        let client = AnthropicClient::new(&config_for(&server)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::RateLimit {
                retry_after: Some(d)
            } if d == Duration::from_secs(12)
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_upstream() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = AnthropicClient::new(&config_for(&server)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        match err {
            PipelineError::Upstream(msg) => assert!(msg.contains("500") && msg.contains("boom")),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_content_maps_to_empty_response() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":[{"type":"text","text":"  \n"}]}"#)
            .create_async()
            .await;

        let client = AnthropicClient::new(&config_for(&server)).unwrap();
        assert!(matches!(
            client.complete(&request()).await,
            Err(PipelineError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn malformed_json_maps_to_upstream() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = AnthropicClient::new(&config_for(&server)).unwrap();
        assert!(matches!(
            client.complete(&request()).await,
            Err(PipelineError::Upstream(_))
        ));
    }
}
