// One analysis run: normalize → embed → fit → enhance → summarize.
//
// Each run owns its corpus, embeddings, and topic model outright. The only
// state shared between concurrent runs is the embedder registry, which
// hands out read-only embedders.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::result::AnalysisResult;
use super::stream::{Progress, Stage, StreamEvent};
use crate::llm::redact;
use crate::llm::traits::{ChatClientFactory, ChatCompletion};
use crate::representation::Enhancer;
use crate::summary::generate_summary;
use crate::topics::cluster::ClusterConfig;
use crate::topics::model::TopicModel;
use crate::topics::normalize::clean_values;
use crate::topics::registry::EmbedderRegistry;

pub const DEFAULT_POST_TITLE: &str = "Reddit Post";

/// Events buffered between the run and the transport.
const STREAM_BUFFER: usize = 32;

/// Inbound request body.
#[derive(Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub comments: Vec<Value>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub post_title: Option<String>,
}

impl fmt::Debug for AnalyzeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzeRequest")
            .field("comments", &self.comments.len())
            .field("openai_api_key", &self.api_key().map(|_| "<provided>"))
            .field("post_title", &self.title())
            .finish()
    }
}

impl AnalyzeRequest {
    /// Reject requests that cannot start a run.
    pub fn validate(&self) -> Result<()> {
        if self.comments.is_empty() {
            anyhow::bail!("No comments to analyze");
        }
        Ok(())
    }

    /// The credential, if one was supplied and is not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn title(&self) -> &str {
        self.post_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_POST_TITLE)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embedding_model: String,
    pub cluster: ClusterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding_model: crate::config::DEFAULT_EMBEDDING_MODEL.to_string(),
            cluster: ClusterConfig::default(),
        }
    }
}

/// Shared entry point for analysis runs. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<EmbedderRegistry>,
    chat: Arc<dyn ChatClientFactory>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        registry: Arc<EmbedderRegistry>,
        chat: Arc<dyn ChatClientFactory>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            chat,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Spawn a run and return its event stream.
    ///
    /// The request must already be validated. The run continues to
    /// completion even if the receiver is dropped.
    pub fn start(&self, request: AnalyzeRequest) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let pipeline = self.clone();
        tokio::spawn(async move {
            let mut progress = Progress::new(tx);
            pipeline.execute(request, &mut progress).await;
        });
        rx
    }

    /// Drive one run to a terminal event.
    pub async fn execute(&self, request: AnalyzeRequest, progress: &mut Progress) {
        let secret = request.api_key().unwrap_or_default().to_string();
        match self.run(&request, progress).await {
            Ok(result) => {
                info!(
                    topics = result.num_topics,
                    comments = result.num_comments,
                    model_used = %result.model_used,
                    "Analysis complete"
                );
                progress.complete(result).await;
            }
            Err(e) => {
                let message = redact(&format!("{e:#}"), &secret);
                let traceback = redact(&format!("{e:?}"), &secret);
                error!(
                    stage = ?progress.stage(),
                    percent = progress.percent(),
                    error = %message,
                    "Analysis failed"
                );
                progress.fail(message, traceback).await;
            }
        }
    }

    async fn run(&self, request: &AnalyzeRequest, progress: &mut Progress) -> Result<AnalysisResult> {
        request.validate()?;
        info!(
            comments = request.comments.len(),
            key = if request.api_key().is_some() { "provided" } else { "not provided" },
            "Starting analysis"
        );

        progress.advance(Stage::Modeling, "Loading models...", 10).await;
        let corpus = clean_values(&request.comments);
        let embedder = self.registry.get(&self.config.embedding_model).await?;

        progress.advance(Stage::Modeling, "Embedding comments...", 30).await;
        let real_documents = corpus.real_len();
        let docs = corpus.into_docs();
        let embeddings = embedder
            .embed(&docs)
            .await
            .context("Failed to embed comments")?;
        if let Some(bad) = embeddings.iter().find(|e| e.len() != embedder.dimension()) {
            anyhow::bail!(
                "{} returned a {}-dimensional embedding, expected {}",
                embedder.model_name(),
                bad.len(),
                embedder.dimension()
            );
        }

        progress.advance(Stage::Clustering, "Analyzing topics...", 70).await;
        let model = {
            let docs = docs.clone();
            let cluster = self.config.cluster.clone();
            tokio::task::spawn_blocking(move || TopicModel::fit(&docs, &embeddings, &cluster))
                .await
                .context("spawn_blocking panicked")?
                .context("Topic modeling failed")?
        };
        info!(
            mode = ?model.mode(),
            topics = model.topic_ids().len(),
            placeholders = docs.len() - real_documents,
            "Clustered comments"
        );

        progress
            .advance(Stage::Clustering, "Processing topic information...", 80)
            .await;
        let chat = self.chat_client(request);

        let message = if request.api_key().is_some() {
            "Enhancing with OpenAI..."
        } else {
            "Enhancing with Hugging Face..."
        };
        progress.advance(Stage::Enhancing, message, 85).await;
        let enhancer = Enhancer::standard(Arc::clone(&embedder), chat.clone());
        let enhancement = enhancer.enhance(&model, &docs).await;

        progress.advance(Stage::Enhancing, "Finalizing results...", 90).await;
        let mut result = AnalysisResult::new(
            &enhancement.model,
            real_documents,
            &enhancement.strategy,
            None,
            request.title(),
        );

        if let Some(client) = chat.as_deref() {
            progress
                .advance(Stage::Summarizing, "Generating summary...", 95)
                .await;
            result.summary = generate_summary(Some(client), &result.topics, request.title()).await;
        }

        Ok(result)
    }

    /// Completion client for this request's credential. A client that
    /// cannot be built counts as a failed remote tier.
    fn chat_client(&self, request: &AnalyzeRequest) -> Option<Arc<dyn ChatCompletion>> {
        let key = request.api_key()?;
        match self.chat.create(key) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(
                    error = %redact(&format!("{e:#}"), key),
                    "Could not create completion client"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let req: AnalyzeRequest = serde_json::from_value(json!({"comments": ["a"]})).unwrap();
        assert_eq!(req.title(), DEFAULT_POST_TITLE);
        assert_eq!(req.api_key(), None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_blank_key_counts_as_absent() {
        let req: AnalyzeRequest =
            serde_json::from_value(json!({"comments": ["a"], "openai_api_key": "  "})).unwrap();
        assert_eq!(req.api_key(), None);
    }

    #[test]
    fn test_empty_comments_rejected() {
        let req: AnalyzeRequest = serde_json::from_value(json!({"comments": []})).unwrap();
        assert_eq!(req.validate().unwrap_err().to_string(), "No comments to analyze");
    }

    #[test]
    fn test_debug_hides_key() {
        let req: AnalyzeRequest = serde_json::from_value(
            json!({"comments": ["a"], "openai_api_key": "sk-secret-value"}),
        )
        .unwrap();
        let rendered = format!("{req:?}");
        assert!(!rendered.contains("sk-secret-value"));
        assert!(rendered.contains("<provided>"));
    }
}
