/// LLM client: the single point of entry for all hosted-model calls.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Chat replies and resume analysis both go through `CompletionModel`,
/// wrapped in `retry::complete_with_retry`.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmSettings;

pub mod retry;
#[cfg(test)]
pub(crate) mod testing;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Haiku keeps chat latency low; override with `LLM_MODEL`.
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Throttled by upstream: {0}")]
    Throttled(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("LLM credentials are not configured")]
    NotConfigured,
}

impl LlmError {
    /// Rate-limit class errors are the only ones worth retrying.
    pub fn is_throttled(&self) -> bool {
        matches!(self, LlmError::Throttled(_))
    }
}

/// One completion call: a single user turn plus an optional system prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A hosted completion model. Implementations perform exactly one upstream
/// attempt per call; retries live in `retry`.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Concatenates every text block of the response.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl LlmClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let api_key = settings.api_key.clone().ok_or(LlmError::NotConfigured)?;
        Ok(Self {
            client: Client::builder().timeout(settings.timeout).build()?,
            api_key,
            model: settings.model.clone(),
            api_url: settings.api_url.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionModel for LlmClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.prompt,
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(LlmError::Throttled(message));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let llm_response: LlmResponse = response.json().await?;

        if let Some(usage) = &llm_response.usage {
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        llm_response.text().ok_or(LlmError::EmptyContent)
    }
}

/// Deserializes a model reply that was instructed to be JSON only.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fences(text)).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, response::IntoResponse, routing::post, Router};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn start_mock_anthropic(
        status: u16,
        body: &'static str,
    ) -> (String, oneshot::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new().route(
            "/v1/messages",
            post(move || async move {
                (AxumStatus::from_u16(status).unwrap(), body).into_response()
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/messages", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });
        (url, shutdown_tx)
    }

    fn client_for(url: &str) -> LlmClient {
        LlmClient::new(&LlmSettings {
            api_key: Some("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            api_url: url.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request(prompt: &str) -> CompletionRequest<'_> {
        CompletionRequest {
            prompt,
            system: None,
            max_tokens: 100,
            temperature: 0.7,
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_client_requires_api_key() {
        let settings = LlmSettings {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            LlmClient::new(&settings),
            Err(LlmError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_text_blocks_are_concatenated() {
        let body = r#"{"content":[{"type":"text","text":"Hello "},{"type":"text","text":"Maria"}],
                       "usage":{"input_tokens":3,"output_tokens":2}}"#;
        let (url, shutdown) = start_mock_anthropic(200, body).await;

        let reply = client_for(&url).complete(&request("hi")).await.unwrap();

        assert_eq!(reply, "Hello Maria");
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_throttled() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"slow down"}}"#;
        let (url, shutdown) = start_mock_anthropic(429, body).await;

        let err = client_for(&url).complete(&request("hi")).await.unwrap_err();

        assert!(err.is_throttled());
        assert!(err.to_string().contains("slow down"));
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_server_error_is_not_throttled() {
        let (url, shutdown) = start_mock_anthropic(500, "boom").await;

        let err = client_for(&url).complete(&request("hi")).await.unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert!(!err.is_throttled());
        shutdown.send(()).ok();
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let (url, shutdown) = start_mock_anthropic(200, r#"{"content":[]}"#).await;

        let err = client_for(&url).complete(&request("hi")).await.unwrap_err();

        assert!(matches!(err, LlmError::EmptyContent));
        shutdown.send(()).ok();
    }
}
