// TopicModel — the document→topic assignment plus everything derived from
// it: keywords, labels, representative documents, and soft probabilities.
//
// A TopicModel is a value. Representation strategies receive a reference
// and return a new model via the `with_*` builders, so a failed enhancement
// attempt can never leave the caller holding a half-updated snapshot.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use super::cluster::{self, ClusterConfig, ClusterMode, OUTLIER};
use super::ctfidf::{ClassTfIdf, Keywords};
use super::embeddings::{cosine_similarity, mean_embedding};
use super::normalize::MIN_DOCUMENTS;
use super::reduce;

/// How many documents closest to a topic centroid are kept per topic.
pub const REPRESENTATIVE_DOCS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicModel {
    mode: ClusterMode,
    /// Topic id per document, parallel to the corpus
    assignments: Vec<i32>,
    /// Per-document membership weights over topics 0..num_topics
    probabilities: Vec<Vec<f32>>,
    keywords: BTreeMap<i32, Keywords>,
    /// Labels set by a representation strategy
    labels: BTreeMap<i32, String>,
    /// Corpus indices closest to each topic centroid, best first
    representative_docs: BTreeMap<i32, Vec<usize>>,
}

/// Read-only view of one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicInfo {
    pub id: i32,
    pub count: usize,
    pub keywords: Keywords,
    pub label: Option<String>,
}

impl TopicModel {
    /// Reduce, cluster, and extract keywords in one go.
    ///
    /// CPU-bound; call from spawn_blocking in async contexts.
    pub fn fit(docs: &[String], embeddings: &[Vec<f32>], config: &ClusterConfig) -> Result<Self> {
        if docs.len() != embeddings.len() {
            anyhow::bail!(
                "Got {} documents but {} embeddings",
                docs.len(),
                embeddings.len()
            );
        }
        if docs.len() < MIN_DOCUMENTS {
            anyhow::bail!(
                "Clustering needs at least {MIN_DOCUMENTS} documents, got {}",
                docs.len()
            );
        }

        let (raw_labels, reduced) = match config.mode {
            ClusterMode::Deterministic => {
                let data = reduce::to_matrix(embeddings)?;
                let reduced = reduce::pca(&data, config.n_components)?;
                (
                    cluster::kmeans(&reduced, config.num_clusters, config.seed)?,
                    reduced,
                )
            }
            ClusterMode::Density => {
                let reduced = reduce::spectral(
                    embeddings,
                    config.n_components,
                    config.n_neighbors,
                    config.seed,
                )?;
                (cluster::dbscan(&reduced, config.min_cluster_size)?, reduced)
            }
        };

        let assignments = renumber_by_size(&raw_labels);
        let num_topics = assignments
            .iter()
            .filter(|&&t| t != OUTLIER)
            .max()
            .map_or(0, |&m| m as usize + 1);
        let probabilities = cluster::soft_probabilities(&reduced, &assignments, num_topics);

        let model = Self::from_assignments(docs, embeddings, assignments, probabilities, config.mode);
        info!(
            mode = ?config.mode,
            docs = docs.len(),
            topics = model.topic_ids().len(),
            outliers = model.count(OUTLIER),
            "Topic model fit complete"
        );
        Ok(model)
    }

    /// Build a model from known assignments, deriving keywords and
    /// representative documents.
    pub fn from_assignments(
        docs: &[String],
        embeddings: &[Vec<f32>],
        assignments: Vec<i32>,
        probabilities: Vec<Vec<f32>>,
        mode: ClusterMode,
    ) -> Self {
        let keywords = ClassTfIdf::default().extract(docs, &assignments);
        let representative_docs = representatives(embeddings, &assignments);
        Self {
            mode,
            assignments,
            probabilities,
            keywords,
            labels: BTreeMap::new(),
            representative_docs,
        }
    }

    pub fn mode(&self) -> ClusterMode {
        self.mode
    }

    pub fn assignments(&self) -> &[i32] {
        &self.assignments
    }

    pub fn probabilities(&self) -> &[Vec<f32>] {
        &self.probabilities
    }

    pub fn num_documents(&self) -> usize {
        self.assignments.len()
    }

    /// Non-outlier topic ids, ascending.
    pub fn topic_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .assignments
            .iter()
            .copied()
            .filter(|&t| t != OUTLIER)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn count(&self, topic: i32) -> usize {
        self.assignments.iter().filter(|&&t| t == topic).count()
    }

    pub fn keywords(&self, topic: i32) -> &[(String, f32)] {
        self.keywords.get(&topic).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn label(&self, topic: i32) -> Option<&str> {
        self.labels.get(&topic).map(String::as_str)
    }

    pub fn representative_docs(&self, topic: i32) -> &[usize] {
        self.representative_docs
            .get(&topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Corpus indices assigned to `topic`, in corpus order.
    pub fn documents_of(&self, topic: i32) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &t)| t == topic)
            .map(|(i, _)| i)
            .collect()
    }

    /// All non-outlier topics, largest first, ties by id.
    pub fn topic_info(&self) -> Vec<TopicInfo> {
        let mut info: Vec<TopicInfo> = self
            .topic_ids()
            .into_iter()
            .map(|id| TopicInfo {
                id,
                count: self.count(id),
                keywords: self.keywords(id).to_vec(),
                label: self.label(id).map(str::to_string),
            })
            .collect();
        info.sort_by(|a, b| b.count.cmp(&a.count).then(a.id.cmp(&b.id)));
        info
    }

    /// Copy with `topic`'s keywords replaced.
    pub fn with_keywords(&self, topic: i32, keywords: Keywords) -> Self {
        let mut next = self.clone();
        next.keywords.insert(topic, keywords);
        next
    }

    /// Copy with `topic`'s label set.
    pub fn with_label(&self, topic: i32, label: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.labels.insert(topic, label.into());
        next
    }
}

/// Relabel clusters so the largest is topic 0. Ties keep the order in which
/// clusters first appear. Outliers stay at -1.
fn renumber_by_size(raw: &[i32]) -> Vec<i32> {
    let mut stats: Vec<(i32, usize, usize)> = Vec::new(); // (raw id, count, first index)
    for (i, &label) in raw.iter().enumerate() {
        if label == OUTLIER {
            continue;
        }
        match stats.iter_mut().find(|(id, _, _)| *id == label) {
            Some(entry) => entry.1 += 1,
            None => stats.push((label, 1, i)),
        }
    }
    stats.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    raw.iter()
        .map(|&label| {
            stats
                .iter()
                .position(|(id, _, _)| *id == label)
                .map_or(OUTLIER, |p| p as i32)
        })
        .collect()
}

fn representatives(embeddings: &[Vec<f32>], assignments: &[i32]) -> BTreeMap<i32, Vec<usize>> {
    let mut members: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (i, &t) in assignments.iter().enumerate() {
        if t != OUTLIER {
            members.entry(t).or_default().push(i);
        }
    }

    members
        .into_iter()
        .map(|(topic, idxs)| {
            let vectors: Vec<&[f32]> = idxs.iter().map(|&i| embeddings[i].as_slice()).collect();
            let centroid = mean_embedding(&vectors);
            let mut ranked: Vec<(usize, f32)> = idxs
                .iter()
                .map(|&i| (i, cosine_similarity(&embeddings[i], &centroid)))
                .collect();
            ranked.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            let docs = ranked
                .into_iter()
                .take(REPRESENTATIVE_DOCS)
                .map(|(i, _)| i)
                .collect();
            (topic, docs)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renumber_largest_first() {
        let raw = vec![3, 1, 1, -1, 1, 3, 7];
        assert_eq!(renumber_by_size(&raw), vec![1, 0, 0, -1, 0, 1, 2]);
    }

    #[test]
    fn test_renumber_all_outliers() {
        assert_eq!(renumber_by_size(&[-1, -1, -1]), vec![-1, -1, -1]);
    }

    #[test]
    fn test_with_label_leaves_original_untouched() {
        let docs: Vec<String> = ["alpha beta", "alpha gamma", "delta epsilon"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let embeddings = vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]];
        let model = TopicModel::from_assignments(
            &docs,
            &embeddings,
            vec![0, 0, 1],
            Vec::new(),
            ClusterMode::Deterministic,
        );

        let labelled = model.with_label(0, "Greek letters");
        assert_eq!(labelled.label(0), Some("Greek letters"));
        assert_eq!(model.label(0), None);
        assert_eq!(model.representative_docs(0).len(), 2);
    }
}
