// Remote tier — ask a hosted chat model for a short label per topic.
//
// Each topic's representative documents are re-cleaned with a much tighter
// length clamp than the normalizer uses, so one prompt stays small no matter
// how long the comments are.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::traits::RepresentationStrategy;
use crate::llm::traits::{ChatCompletion, CompletionRequest};
use crate::topics::model::TopicModel;

pub const OPENAI_NAME: &str = "OpenAI";

/// Documents sent per topic prompt.
pub const PROMPT_BATCH_SIZE: usize = 8;
/// Per-document character clamp inside prompts.
pub const PROMPT_MAX_LEN: usize = 300;

const LABEL_PROMPT: &str =
    "Summarize the core theme of these documents to create a short topic label: ";

pub struct OpenAiRepresentation {
    client: Arc<dyn ChatCompletion>,
    pub batch_size: usize,
    pub max_len: usize,
}

impl OpenAiRepresentation {
    pub fn new(client: Arc<dyn ChatCompletion>) -> Self {
        Self {
            client,
            batch_size: PROMPT_BATCH_SIZE,
            max_len: PROMPT_MAX_LEN,
        }
    }

    /// Prompt-side cleaning: blank becomes a marker, long text is clamped,
    /// very short text is doubled so the model has something to read.
    pub fn clean(&self, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "empty document".to_string();
        }
        if text.chars().count() > self.max_len {
            return text.chars().take(self.max_len).collect();
        }
        if text.chars().count() < 10 {
            return format!("{text} {text}");
        }
        text.to_string()
    }

    pub fn label_prompt(&self, docs: &[&str]) -> String {
        let joined = docs
            .iter()
            .map(|d| self.clean(d))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{LABEL_PROMPT}\n{joined}\n")
    }
}

#[async_trait]
impl RepresentationStrategy for OpenAiRepresentation {
    fn name(&self) -> &str {
        OPENAI_NAME
    }

    async fn represent(&self, model: &TopicModel, docs: &[String]) -> Result<TopicModel> {
        let mut next = model.clone();

        for topic in model.topic_ids() {
            let sample: Vec<&str> = model
                .representative_docs(topic)
                .iter()
                .take(self.batch_size)
                .filter_map(|&i| docs.get(i).map(String::as_str))
                .collect();

            debug!(
                topic,
                docs = sample.len(),
                model = %self.client.model(),
                "Requesting topic label"
            );

            let prompt = self.label_prompt(&sample);
            let label = self
                .client
                .complete(&CompletionRequest::user(prompt))
                .await
                .with_context(|| {
                    format!(
                        "Label request failed for topic {topic} ({} docs, model {})",
                        sample.len(),
                        self.client.model()
                    )
                })?;

            let label = label.trim();
            if label.is_empty() {
                anyhow::bail!("Empty label returned for topic {topic}");
            }
            info!(topic, label, "Topic label generated");
            next = next.with_label(topic, label);
        }

        Ok(next)
    }
}
