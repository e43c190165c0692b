//! Coaching chat: the retrying completion proxy behind `POST /api/chat` and a
//! small client that keeps the conversation for the CLI.

use serde::{Deserialize, Serialize};

pub mod client;
pub mod handlers;
pub mod prompts;
pub mod proxy;

pub use client::{ChatClient, ChatClientError};
pub use proxy::{ChatError, ChatProxy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message of a conversation, kept in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
