// Ordered fallback chain over representation strategies.
//
// Tiers are tried in order. The first one that succeeds wins; each failure
// is logged and the next tier gets the same untouched snapshot. The chain
// always ends in the baseline tier, so `enhance` cannot fail.

use std::sync::Arc;

use tracing::{info, warn};

use super::baseline::{Baseline, BASELINE_NAME};
use super::keybert::KeyBertRepresentation;
use super::openai::OpenAiRepresentation;
use super::traits::RepresentationStrategy;
use crate::llm::traits::ChatCompletion;
use crate::topics::model::TopicModel;
use crate::topics::traits::Embedder;

/// A relabelled model plus the name of the tier that produced it.
#[derive(Debug, Clone)]
pub struct Enhancement {
    pub model: TopicModel,
    pub strategy: String,
}

pub struct Enhancer {
    tiers: Vec<Box<dyn RepresentationStrategy>>,
}

impl Enhancer {
    pub fn new(tiers: Vec<Box<dyn RepresentationStrategy>>) -> Self {
        Self { tiers }
    }

    /// The standard chain: remote (when a client is available), then local
    /// re-ranking, then baseline.
    pub fn standard(embedder: Arc<dyn Embedder>, chat: Option<Arc<dyn ChatCompletion>>) -> Self {
        let mut tiers: Vec<Box<dyn RepresentationStrategy>> = Vec::new();
        if let Some(client) = chat {
            tiers.push(Box::new(OpenAiRepresentation::new(client)));
        }
        tiers.push(Box::new(KeyBertRepresentation::new(embedder)));
        tiers.push(Box::new(Baseline));
        Self { tiers }
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub async fn enhance(&self, model: &TopicModel, docs: &[String]) -> Enhancement {
        for tier in &self.tiers {
            match tier.represent(model, docs).await {
                Ok(enhanced) => {
                    info!(
                        strategy = tier.name(),
                        topics = enhanced.topic_ids().len(),
                        "Topic representation enhanced"
                    );
                    return Enhancement {
                        model: enhanced,
                        strategy: tier.name().to_string(),
                    };
                }
                Err(e) => {
                    warn!(
                        strategy = tier.name(),
                        docs = docs.len(),
                        error = %format!("{e:#}"),
                        "Representation tier failed, falling back"
                    );
                }
            }
        }

        Enhancement {
            model: model.clone(),
            strategy: BASELINE_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::CompletionRequest;
    use crate::representation::keybert::KEYBERT_NAME;
    use crate::representation::openai::OPENAI_NAME;
    use crate::topics::cluster::ClusterMode;
    use crate::topics::hashing::HashingEmbedder;
    use anyhow::Result;
    use async_trait::async_trait;

    struct Broken;

    #[async_trait]
    impl ChatCompletion for Broken {
        fn model(&self) -> &str {
            "broken"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            anyhow::bail!("429 quota exceeded")
        }
    }

    struct Fixed;

    #[async_trait]
    impl ChatCompletion for Fixed {
        fn model(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok("  Product feedback \n".to_string())
        }
    }

    struct FailingTier;

    #[async_trait]
    impl RepresentationStrategy for FailingTier {
        fn name(&self) -> &str {
            "failing"
        }

        async fn represent(&self, _model: &TopicModel, _docs: &[String]) -> Result<TopicModel> {
            anyhow::bail!("tier exploded")
        }
    }

    fn fixture() -> (TopicModel, Vec<String>) {
        let docs: Vec<String> = ["great product here", "great product again", "terrible product"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let embedder = HashingEmbedder::default();
        let embeddings: Vec<Vec<f32>> = docs.iter().map(|d| embedder.embed_one(d)).collect();
        let model = TopicModel::from_assignments(
            &docs,
            &embeddings,
            vec![0, 0, 1],
            Vec::new(),
            ClusterMode::Deterministic,
        );
        (model, docs)
    }

    #[test]
    fn test_chain_order() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let without = Enhancer::standard(embedder.clone(), None);
        assert_eq!(without.tier_names(), vec![KEYBERT_NAME, BASELINE_NAME]);

        let with = Enhancer::standard(embedder, Some(Arc::new(Fixed)));
        assert_eq!(with.tier_names(), vec![OPENAI_NAME, KEYBERT_NAME, BASELINE_NAME]);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let (model, docs) = fixture();
        let enhancer = Enhancer::standard(Arc::new(HashingEmbedder::default()), Some(Arc::new(Broken)));
        let result = enhancer.enhance(&model, &docs).await;
        assert_eq!(result.strategy, KEYBERT_NAME);
        assert_eq!(result.model.label(0), None);
    }

    #[tokio::test]
    async fn test_remote_success_sets_trimmed_labels() {
        let (model, docs) = fixture();
        let enhancer = Enhancer::standard(Arc::new(HashingEmbedder::default()), Some(Arc::new(Fixed)));
        let result = enhancer.enhance(&model, &docs).await;
        assert_eq!(result.strategy, OPENAI_NAME);
        assert_eq!(result.model.label(0), Some("Product feedback"));
        assert_eq!(model.label(0), None);
    }

    #[tokio::test]
    async fn test_all_tiers_failing_yields_baseline() {
        let (model, docs) = fixture();
        let enhancer = Enhancer::new(vec![Box::new(FailingTier), Box::new(FailingTier)]);
        let result = enhancer.enhance(&model, &docs).await;
        assert_eq!(result.strategy, BASELINE_NAME);
        assert_eq!(result.model, model);
    }
}
