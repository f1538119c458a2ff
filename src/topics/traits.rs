// Embedder trait — the seam between the pipeline and whatever produces
// document vectors.
//
// The default implementation runs all-MiniLM-L6-v2 locally via ONNX. Tests
// and offline deployments use the lexical HashingEmbedder instead, injected
// through the EmbedderRegistry.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Maps documents to fixed-length vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name the embedder was registered under.
    fn model_name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts. Any failure is fatal to the caller's run.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Constructs an embedder for a model name. Called at most once per name
/// by the registry.
pub trait EmbedderLoader: Send + Sync {
    fn load(&self, model_name: &str) -> Result<Arc<dyn Embedder>>;
}
