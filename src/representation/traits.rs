// Representation strategy trait — one tier of the fallback chain.

use anyhow::Result;
use async_trait::async_trait;

use crate::topics::model::TopicModel;

/// A labeling method. Implementations never mutate `model`; they return a
/// new snapshot so the caller can fall back to the original on error.
#[async_trait]
pub trait RepresentationStrategy: Send + Sync {
    /// Reported to callers as `model_used` when this tier succeeds.
    fn name(&self) -> &str;

    /// Produce a relabelled copy of `model`. `docs` is the corpus the model
    /// was fit on.
    async fn represent(&self, model: &TopicModel, docs: &[String]) -> Result<TopicModel>;
}
