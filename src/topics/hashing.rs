// Lexical feature-hashing embedder.
//
// No model files, no network: each lowercase word (and each adjacent word
// pair) is hashed into one of `dim` buckets with a signed count, then the
// vector is L2-normalised. Documents that share vocabulary end up close in
// cosine space. Used for offline runs and as the injected embedder in tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::embeddings::l2_normalize;
use super::traits::{Embedder, EmbedderLoader};

pub const HASHING_DIM: usize = 256;

pub struct HashingEmbedder {
    name: String,
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(name: &str, dim: usize) -> Self {
        Self {
            name: name.to_string(),
            dim: dim.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut v = vec![0.0_f32; self.dim];
        for w in &words {
            self.add_feature(&mut v, w, 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut v, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        l2_normalize(&mut v);
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let bucket = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new("hashing", HASHING_DIM)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Loader that hands out hashing embedders regardless of model name.
pub struct HashingLoader;

impl EmbedderLoader for HashingLoader {
    fn load(&self, model_name: &str) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(HashingEmbedder::new(model_name, HASHING_DIM)))
    }
}
