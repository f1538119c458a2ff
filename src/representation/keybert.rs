// Local tier — KeyBERT-style keyword re-ranking.
//
// Candidate words come from a wider c-TF-IDF pass plus per-topic TF-IDF
// keywords. Each candidate is embedded with the same embedder as the
// documents and scored by cosine similarity to the mean embedding of the
// topic's representative documents. Words that mean what the topic is about
// float up; words that are merely frequent sink. No network calls.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use stop_words::{get, LANGUAGE};
use tracing::debug;

use super::traits::RepresentationStrategy;
use crate::topics::ctfidf::{ClassTfIdf, Keywords};
use crate::topics::embeddings::{cosine_similarity, mean_embedding};
use crate::topics::model::TopicModel;
use crate::topics::traits::Embedder;

pub const KEYBERT_NAME: &str = "Hugging Face (KeyBERT)";

pub struct KeyBertRepresentation {
    embedder: Arc<dyn Embedder>,
    /// c-TF-IDF words considered per topic
    pub candidates: usize,
    /// Keywords kept per topic after re-ranking
    pub top_n: usize,
}

impl KeyBertRepresentation {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            candidates: 30,
            top_n: 10,
        }
    }

    /// Candidate words for one topic, deduplicated, c-TF-IDF words first.
    fn candidates_for(
        &self,
        ctfidf_words: &[(String, f32)],
        topic_docs: &[String],
        stop_words: &[String],
    ) -> Vec<String> {
        let mut words: Vec<String> = ctfidf_words.iter().map(|(w, _)| w.clone()).collect();

        if !topic_docs.is_empty() {
            let tfidf = TfIdf::new(TfIdfParams::UnprocessedDocuments(
                topic_docs, stop_words, None,
            ));
            for (word, _) in tfidf.get_ranked_word_scores(self.top_n) {
                let word = word.to_lowercase();
                if word.chars().count() >= 2 && !words.contains(&word) {
                    words.push(word);
                }
            }
        }
        words
    }
}

#[async_trait]
impl RepresentationStrategy for KeyBertRepresentation {
    fn name(&self) -> &str {
        KEYBERT_NAME
    }

    async fn represent(&self, model: &TopicModel, docs: &[String]) -> Result<TopicModel> {
        let wide = ClassTfIdf::new(self.candidates).extract(docs, model.assignments());
        let stop_words: Vec<String> = get(LANGUAGE::English);
        let mut next = model.clone();

        for topic in model.topic_ids() {
            let topic_docs: Vec<String> = model
                .documents_of(topic)
                .into_iter()
                .filter_map(|i| docs.get(i).cloned())
                .collect();
            let ctfidf_words = wide.get(&topic).map(Vec::as_slice).unwrap_or(&[]);
            let candidates = self.candidates_for(ctfidf_words, &topic_docs, &stop_words);
            if candidates.is_empty() {
                continue;
            }

            let representative: Vec<String> = model
                .representative_docs(topic)
                .iter()
                .filter_map(|&i| docs.get(i).cloned())
                .collect();
            let doc_vectors = self
                .embedder
                .embed(&representative)
                .await
                .with_context(|| format!("Failed to embed documents for topic {topic}"))?;
            let doc_refs: Vec<&[f32]> = doc_vectors.iter().map(Vec::as_slice).collect();
            let topic_vector = mean_embedding(&doc_refs);

            let word_vectors = self
                .embedder
                .embed(&candidates)
                .await
                .with_context(|| format!("Failed to embed keywords for topic {topic}"))?;

            let mut ranked: Keywords = candidates
                .into_iter()
                .zip(word_vectors.iter())
                .map(|(word, v)| {
                    let score = cosine_similarity(v, &topic_vector);
                    (word, score)
                })
                .collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            ranked.truncate(self.top_n);

            debug!(
                topic,
                top = ranked.first().map(|(w, _)| w.as_str()).unwrap_or(""),
                "Keywords re-ranked"
            );
            next = next.with_keywords(topic, ranked);
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::cluster::ClusterMode;
    use crate::topics::hashing::HashingEmbedder;

    #[tokio::test]
    async fn test_rerank_keeps_topic_words() {
        let docs: Vec<String> = [
            "battery life is terrible on this phone",
            "the battery drains overnight",
            "battery barely lasts a day",
            "shipping took three weeks",
            "slow shipping and damaged box",
            "shipping was late again",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let embedder = HashingEmbedder::default();
        let embeddings: Vec<Vec<f32>> = docs.iter().map(|d| embedder.embed_one(d)).collect();
        let model = TopicModel::from_assignments(
            &docs,
            &embeddings,
            vec![0, 0, 0, 1, 1, 1],
            Vec::new(),
            ClusterMode::Deterministic,
        );
        let before = model.keywords(0).to_vec();

        let tier = KeyBertRepresentation::new(Arc::new(embedder));
        let out = tier.represent(&model, &docs).await.unwrap();

        let words: Vec<&str> = out.keywords(0).iter().map(|(w, _)| w.as_str()).collect();
        assert!(words.contains(&"battery"));
        assert!(out.keywords(0).len() <= 10);
        assert_eq!(model.keywords(0), before.as_slice());
    }
}
