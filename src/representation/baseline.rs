// Baseline tier — keep the c-TF-IDF keywords as they are.

use anyhow::Result;
use async_trait::async_trait;

use super::traits::RepresentationStrategy;
use crate::topics::model::TopicModel;

pub const BASELINE_NAME: &str = "Basic BERTopic (no enhancement)";

pub struct Baseline;

#[async_trait]
impl RepresentationStrategy for Baseline {
    fn name(&self) -> &str {
        BASELINE_NAME
    }

    async fn represent(&self, model: &TopicModel, _docs: &[String]) -> Result<TopicModel> {
        Ok(model.clone())
    }
}
