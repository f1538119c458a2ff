// Chat-completion abstraction — the seam tests use to stub the remote
// service.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// One message in a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single completion request. Unset sampling fields are left to the
/// service's defaults.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            ..Default::default()
        }
    }
}

/// A hosted chat-completion service.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Model name sent with every request.
    fn model(&self) -> &str;

    /// Return the text of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Builds a completion client for one request's credential.
pub trait ChatClientFactory: Send + Sync {
    fn create(&self, api_key: &str) -> Result<Arc<dyn ChatCompletion>>;
}
