//! Text-completion providers consumed by the AI relay.
//!
//! The relay only needs request/response completion: a list of chat
//! messages goes in, one assistant reply comes out. Failures are reported
//! to the caller as-is; there is no retry or backoff.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::OpenAiCompatibleProvider;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// An external text-completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete the conversation and return the assistant's reply
    async fn complete(&self, messages: &[ChatMessage]) -> LlmResult<String>;

    /// Name used in logs
    fn provider_name(&self) -> &str;
}
