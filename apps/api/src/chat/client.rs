use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::chat::ChatTurn;

const GENERIC_CHAT_FAILURE: &str = "AI service temporarily unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ChatClientError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    response: Option<String>,
    error: Option<String>,
}

/// Talks to `POST /api/chat` and keeps the conversation in memory.
pub struct ChatClient {
    client: Client,
    base_url: String,
    history: Vec<ChatTurn>,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(90)).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            history: Vec::new(),
        })
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Sends one message. The user turn is recorded even when the reply fails.
    pub async fn send(&mut self, message: &str) -> Result<String, ChatClientError> {
        self.history.push(ChatTurn::user(message));

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({ "message": message }))
            .send()
            .await
            .map_err(|e| {
                warn!("Chat request failed: {e}");
                generic()
            })?;

        let status = response.status();
        let reply: ChatReply = response.json().await.map_err(|e| {
            warn!("Chat reply with status {status} was unreadable: {e}");
            generic()
        })?;

        match reply.response {
            Some(text) if status.is_success() => {
                self.history.push(ChatTurn::assistant(text.clone()));
                Ok(text)
            }
            _ => Err(ChatClientError {
                message: reply.error.unwrap_or_else(|| GENERIC_CHAT_FAILURE.to_string()),
            }),
        }
    }
}

fn generic() -> ChatClientError {
    ChatClientError {
        message: GENERIC_CHAT_FAILURE.to_string(),
    }
}
