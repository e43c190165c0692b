use std::sync::Arc;

use thiserror::Error;
use tracing::{error, warn};

use crate::chat::prompts::{truncate_chars, CHAT_MAX_TOKENS, CHAT_TEMPERATURE, MAX_MESSAGE_CHARS};
use crate::llm_client::retry::{complete_with_retry, RetryPolicy};
use crate::llm_client::{CompletionModel, CompletionRequest};

/// What chat callers see. Upstream detail stays in the logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Failed to get AI response")]
    Failed,

    #[error("AI service temporarily unavailable")]
    Unavailable,
}

/// Forwards chat messages to the completion model, retrying throttled calls.
#[derive(Clone)]
pub struct ChatProxy {
    model: Option<Arc<dyn CompletionModel>>,
    retry: RetryPolicy,
}

impl ChatProxy {
    pub fn new(model: Option<Arc<dyn CompletionModel>>) -> Self {
        Self {
            model,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn build_prompt(message: &str, context: Option<&str>) -> String {
        match context {
            Some(context) => format!("{context}\n\nUser: {message}"),
            None => format!("User: {message}"),
        }
    }

    pub async fn complete(&self, message: &str, context: Option<&str>) -> Result<String, ChatError> {
        let Some(model) = &self.model else {
            warn!("Chat requested but no completion model is configured");
            return Err(ChatError::Unavailable);
        };

        let (message, truncated) = truncate_chars(message, MAX_MESSAGE_CHARS);
        if truncated {
            warn!("Chat message truncated to {MAX_MESSAGE_CHARS} characters");
        }

        let prompt = Self::build_prompt(message, context);
        let request = CompletionRequest {
            prompt: &prompt,
            system: None,
            max_tokens: CHAT_MAX_TOKENS,
            temperature: CHAT_TEMPERATURE,
        };

        complete_with_retry(&**model, &request, &self.retry)
            .await
            .map_err(|e| {
                error!("Chat completion failed: {e}");
                ChatError::Failed
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;
    use crate::llm_client::LlmError;
    use std::time::Duration;
    use tokio::time::Instant;

    fn throttled() -> Result<String, LlmError> {
        Err(LlmError::Throttled("Too many requests".into()))
    }

    #[test]
    fn test_prompt_shape() {
        assert_eq!(ChatProxy::build_prompt("Hi", None), "User: Hi");
        assert_eq!(
            ChatProxy::build_prompt("Hi", Some("Be kind")),
            "Be kind\n\nUser: Hi"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_two_throttles() {
        let model = Arc::new(ScriptedModel::new(vec![
            throttled(),
            throttled(),
            Ok("Start with SQL.".to_string()),
        ]));
        let proxy = ChatProxy::new(Some(model.clone()));

        let start = Instant::now();
        let reply = proxy.complete("Where do I start?", None).await.unwrap();

        assert_eq!(reply, "Start with SQL.");
        assert_eq!(model.calls(), 3);
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert_eq!(model.prompts()[0], "User: Where do I start?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_four_throttles() {
        let model = Arc::new(ScriptedModel::new(vec![
            throttled(),
            throttled(),
            throttled(),
            throttled(),
            Ok("never reached".to_string()),
        ]));
        let proxy = ChatProxy::new(Some(model.clone()));

        let err = proxy.complete("Hello", None).await.unwrap_err();

        assert_eq!(err, ChatError::Failed);
        assert_eq!(err.to_string(), "Failed to get AI response");
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let model = Arc::new(ScriptedModel::new(vec![Err(LlmError::Api {
            status: 400,
            message: "bad request".into(),
        })]));
        let proxy = ChatProxy::new(Some(model.clone()));

        assert_eq!(proxy.complete("Hello", None).await, Err(ChatError::Failed));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_long_message_is_truncated() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("ok".to_string())]));
        let proxy = ChatProxy::new(Some(model.clone()));

        proxy.complete(&"x".repeat(3000), None).await.unwrap();

        let prompt = &model.prompts()[0];
        assert_eq!(prompt.len(), "User: ".len() + MAX_MESSAGE_CHARS);
    }

    #[tokio::test]
    async fn test_unconfigured_proxy_is_unavailable() {
        let proxy = ChatProxy::new(None);
        assert!(!proxy.is_available());
        assert_eq!(
            proxy.complete("Hello", None).await,
            Err(ChatError::Unavailable)
        );
    }
}
