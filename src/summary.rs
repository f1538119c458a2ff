// Narrative summary of the top topics via the chat-completion service.
//
// Strictly best effort: no client means no summary, and any failure is
// logged and swallowed.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::llm::traits::{ChatCompletion, ChatMessage, CompletionRequest};
use crate::pipeline::result::TopicResult;

/// Topics included in the prompt.
pub const SUMMARY_TOPICS: usize = 5;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes Reddit discussions.";

pub fn summary_prompt(topics: &[TopicResult], post_title: &str) -> String {
    let topics_text = topics
        .iter()
        .take(SUMMARY_TOPICS)
        .map(|t| {
            format!(
                "- {} ({}% of comments): {}",
                t.label,
                t.percentage,
                t.words.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Please provide a concise summary of the following Reddit post and its main discussion topics.\n\n\
         Post Title: {post_title}\n\n\
         Main Discussion Topics:\n{topics_text}\n\n\
         Summary:"
    )
}

async fn request_summary(
    client: &dyn ChatCompletion,
    topics: &[TopicResult],
    post_title: &str,
) -> Result<String> {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(summary_prompt(topics, post_title)),
        ],
        max_tokens: Some(300),
        temperature: Some(0.7),
    };
    let text = client
        .complete(&request)
        .await
        .with_context(|| format!("Summary request failed ({})", client.model()))?;
    Ok(text.trim().to_string())
}

/// Summarise the discussion, or `None` when there is no client or the
/// request fails.
pub async fn generate_summary(
    client: Option<&dyn ChatCompletion>,
    topics: &[TopicResult],
    post_title: &str,
) -> Option<String> {
    let Some(client) = client else {
        info!("No completion client, skipping summary");
        return None;
    };

    match request_summary(client, topics, post_title).await {
        Ok(summary) if !summary.is_empty() => {
            info!(chars = summary.len(), "Summary generated");
            Some(summary)
        }
        Ok(_) => {
            warn!("Summary response was empty");
            None
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Summary generation failed");
            None
        }
    }
}
