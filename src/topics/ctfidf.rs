// Class-based TF-IDF keyword extraction.
//
// All documents assigned to one topic are treated as a single "class
// document". A word scores high for a topic when it is frequent inside that
// topic and rare across the others:
//
//   score(t, c) = tf(t, c) / |c| * ln(1 + A / f_t)
//
// where |c| is the number of words in class c, A is the mean class length,
// and f_t is the frequency of t summed over all classes. The outlier class
// takes part in the IDF so that words common to the noise do not dominate
// real topics.

use std::collections::{BTreeMap, HashMap, HashSet};

use stop_words::{get, LANGUAGE};

/// Ranked keywords for one topic, highest score first.
pub type Keywords = Vec<(String, f32)>;

pub struct ClassTfIdf {
    stop_words: HashSet<String>,
    /// How many keywords to keep per topic
    pub top_n: usize,
}

impl Default for ClassTfIdf {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ClassTfIdf {
    pub fn new(top_n: usize) -> Self {
        Self {
            stop_words: get(LANGUAGE::English).into_iter().collect(),
            top_n,
        }
    }

    /// Lowercase, tokenize, and drop stop words.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        // Tokens are runs of two or more word characters.
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| w.chars().count() >= 2)
            .map(str::to_string)
            .filter(|w| !self.stop_words.contains(w))
            .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
            .collect()
    }

    /// Compute ranked keywords for every topic present in `assignments`.
    ///
    /// `docs` and `assignments` are parallel. Topics whose documents contain
    /// no usable words get an empty keyword list.
    pub fn extract(&self, docs: &[String], assignments: &[i32]) -> BTreeMap<i32, Keywords> {
        let mut class_counts: BTreeMap<i32, HashMap<String, f32>> = BTreeMap::new();
        for (doc, &topic) in docs.iter().zip(assignments.iter()) {
            let counts = class_counts.entry(topic).or_default();
            for word in self.tokenize(doc) {
                *counts.entry(word).or_insert(0.0) += 1.0;
            }
        }

        let mut total_freq: HashMap<&str, f32> = HashMap::new();
        let mut class_sizes: BTreeMap<i32, f32> = BTreeMap::new();
        for (&topic, counts) in &class_counts {
            let size: f32 = counts.values().sum();
            class_sizes.insert(topic, size);
            for (word, &count) in counts {
                *total_freq.entry(word.as_str()).or_insert(0.0) += count;
            }
        }

        let n_classes = class_counts.len().max(1) as f32;
        let avg_class_len = class_sizes.values().sum::<f32>() / n_classes;

        let mut result = BTreeMap::new();
        for (&topic, counts) in &class_counts {
            let size = class_sizes.get(&topic).copied().unwrap_or(0.0);
            let mut scored: Keywords = if size > 0.0 {
                counts
                    .iter()
                    .map(|(word, &count)| {
                        let f_t = total_freq.get(word.as_str()).copied().unwrap_or(1.0);
                        let idf = (1.0 + avg_class_len / f_t).ln();
                        (word.clone(), count / size * idf)
                    })
                    .collect()
            } else {
                Vec::new()
            };

            // Ties broken alphabetically so output is stable across runs.
            scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });
            scored.truncate(self.top_n);
            result.insert(topic, scored);
        }

        result
    }
}
