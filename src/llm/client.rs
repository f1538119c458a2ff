// OpenAI-compatible chat-completions client.
//
// API docs: https://platform.openai.com/docs/api-reference/chat

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::redact;
use super::traits::{ChatClientFactory, ChatCompletion, ChatMessage, CompletionRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Chat-completions client bound to one credential.
pub struct OpenAiClient {
    client: Client,
    /// Kept only to scrub it from error text
    api_key: String,
    endpoint: String,
    model: String,
    rate_limiter: RateLimiter,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        timeout: Duration,
        requests_per_second: f64,
    ) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            anyhow::bail!("OpenAI API key is empty");
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("OpenAI API key contains invalid header characters")?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            rate_limiter: RateLimiter::new(requests_per_second),
        })
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.rate_limiter.acquire().await;

        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to call chat completions ({})", self.model))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!(
                "Chat completions returned {}: {}",
                status,
                redact(&text, &self.api_key)
            );
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .context("Chat completions response had no choices")?;

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            chars = content.len(),
            "Chat completion received"
        );
        Ok(content)
    }
}

/// Builds an [`OpenAiClient`] per request credential.
#[derive(Debug, Clone)]
pub struct OpenAiFactory {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub requests_per_second: f64,
}

impl Default for OpenAiFactory {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            requests_per_second: 3.0,
        }
    }
}

impl ChatClientFactory for OpenAiFactory {
    fn create(&self, api_key: &str) -> Result<Arc<dyn ChatCompletion>> {
        let client = OpenAiClient::new(
            api_key,
            &self.base_url,
            &self.model,
            self.timeout,
            self.requests_per_second,
        )?;
        Ok(Arc::new(client))
    }
}

// --- Chat completions request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let err = OpenAiFactory::default().create("   ").err().unwrap();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_request_omits_unset_sampling_fields() {
        let messages = vec![ChatMessage::user("hello")];
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            max_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_parses_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Battery life"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Battery life")
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_errors() {
        let factory = OpenAiFactory {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let client = factory.create("sk-test").unwrap();
        let result = client.complete(&CompletionRequest::user("label this")).await;
        assert!(result.is_err());
    }
}
