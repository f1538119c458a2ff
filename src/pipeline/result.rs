// Result assembly — the payload carried by the terminal `complete` event.

use serde::{Deserialize, Serialize};

use crate::representation::openai::OPENAI_NAME;
use crate::topics::model::TopicModel;

/// Keywords shown per topic.
pub const WORDS_PER_TOPIC: usize = 5;

/// `model_used` before any representation tier has run.
pub const NO_STRATEGY: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicResult {
    pub id: i32,
    pub label: String,
    pub words: Vec<String>,
    pub scores: Vec<f32>,
    pub count: usize,
    /// Share of the request's comments, outliers included, 2 decimals
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub num_topics: usize,
    pub num_comments: usize,
    pub topics: Vec<TopicResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub model_used: String,
    pub openai_enhanced: bool,
    pub post_title: String,
}

impl AnalysisResult {
    /// `real_documents` is how many leading corpus documents came from the
    /// request; anything after them is a placeholder and is not reported.
    pub fn new(
        model: &TopicModel,
        real_documents: usize,
        model_used: &str,
        summary: Option<String>,
        post_title: &str,
    ) -> Self {
        let real_documents = real_documents.min(model.num_documents());
        let topics = topic_results(model, real_documents);
        Self {
            num_topics: topics.len(),
            num_comments: real_documents,
            topics,
            summary,
            model_used: model_used.to_string(),
            openai_enhanced: model_used == OPENAI_NAME,
            post_title: post_title.to_string(),
        }
    }
}

/// Non-outlier topics, largest first, ties by id.
///
/// Counts only include the first `real_documents` corpus entries. Topics
/// holding nothing but placeholders are dropped.
pub fn topic_results(model: &TopicModel, real_documents: usize) -> Vec<TopicResult> {
    let mut results: Vec<TopicResult> = model
        .topic_info()
        .into_iter()
        .filter_map(|info| {
            let count = model
                .documents_of(info.id)
                .iter()
                .filter(|&&i| i < real_documents)
                .count();
            if count == 0 {
                return None;
            }

            let top: Vec<(String, f32)> = info
                .keywords
                .into_iter()
                .filter(|(w, _)| !w.is_empty())
                .take(WORDS_PER_TOPIC)
                .collect();
            let words: Vec<String> = top.iter().map(|(w, _)| w.clone()).collect();
            let scores: Vec<f32> = top.iter().map(|(_, s)| *s).collect();

            let label = match info.label {
                Some(label) => label,
                None if !words.is_empty() => words.join(", "),
                None => format!("Topic {}", info.id),
            };

            Some(TopicResult {
                id: info.id,
                label,
                words,
                scores,
                count,
                percentage: percentage(count, real_documents),
            })
        })
        .collect();
    results.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
    results
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::cluster::ClusterMode;

    fn model(assignments: Vec<i32>) -> TopicModel {
        let docs: Vec<String> = (0..assignments.len())
            .map(|i| format!("document about subject{} widgets", i % 3))
            .collect();
        let embeddings: Vec<Vec<f32>> = (0..assignments.len())
            .map(|i| vec![1.0, i as f32])
            .collect();
        TopicModel::from_assignments(&docs, &embeddings, assignments, Vec::new(), ClusterMode::Density)
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn test_outliers_excluded_but_counted_in_denominator() {
        let results = topic_results(&model(vec![0, 0, -1, 1]), 4);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|t| t.id != -1));
        assert_eq!(results[0].percentage, 50.0);
        assert_eq!(results[1].percentage, 25.0);
    }

    #[test]
    fn test_placeholder_only_topics_dropped() {
        // One real document in topic 1, two placeholders in topic 0.
        let m = model(vec![1, 0, 0]);
        let result = AnalysisResult::new(&m, 1, "Basic BERTopic (no enhancement)", None, "t");
        assert_eq!(result.num_comments, 1);
        assert_eq!(result.num_topics, 1);
        assert_eq!(result.topics[0].id, 1);
        assert_eq!(result.topics[0].count, 1);
        assert_eq!(result.topics[0].percentage, 100.0);
    }

    #[test]
    fn test_mixed_topic_counts_real_documents_only() {
        let results = topic_results(&model(vec![0, 1, 0, 0]), 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|t| t.count == 1));
        assert!(results.iter().all(|t| t.percentage == 50.0));
        assert_eq!(results[0].id, 0);
    }

    #[test]
    fn test_fallback_label_is_joined_words() {
        let results = topic_results(&model(vec![0, 0, 0]), 3);
        assert_eq!(results[0].label, results[0].words.join(", "));
        assert!(results[0].words.len() <= WORDS_PER_TOPIC);
        assert_eq!(results[0].words.len(), results[0].scores.len());
    }

    #[test]
    fn test_openai_enhanced_flag() {
        let m = model(vec![0, 0, 1]);
        assert!(AnalysisResult::new(&m, 3, OPENAI_NAME, None, "t").openai_enhanced);
        let local = AnalysisResult::new(&m, 3, "Hugging Face (KeyBERT)", None, "t");
        assert!(!local.openai_enhanced);
        let json = serde_json::to_value(&local).unwrap();
        assert!(json.get("summary").is_none());
    }
}
