// Clustering of reduced document vectors.
//
// Deterministic mode runs k-means: every document lands in exactly one of k
// clusters. Density mode runs DBSCAN with a radius picked from the data:
// documents in sparse regions get the outlier label -1, and a fully
// dispersed corpus legitimately yields no clusters at all.

use anyhow::Result;
use linfa::traits::{Fit, Predict, Transformer};
use linfa::{DatasetBase, ParamGuard};
use linfa_clustering::{Dbscan, KMeans};
use ndarray::{Array2, ArrayView1, Axis};
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Topic id reserved for documents not confidently in any cluster.
pub const OUTLIER: i32 = -1;

/// Which reducer + clusterer pair to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMode {
    /// PCA + k-means. Stable, fast, no outliers.
    Deterministic,
    /// Spectral kNN-graph embedding + DBSCAN. May produce outliers.
    Density,
}

impl ClusterMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deterministic" | "kmeans" => Some(Self::Deterministic),
            "density" | "dbscan" => Some(Self::Density),
            _ => None,
        }
    }
}

/// Reducer and clusterer settings for one deployment.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub mode: ClusterMode,
    /// k for k-means (clamped to the number of distinct documents)
    pub num_clusters: usize,
    /// Smallest neighbourhood DBSCAN treats as dense
    pub min_cluster_size: usize,
    /// Target dimension after reduction
    pub n_components: usize,
    /// Neighbours per point in the spectral graph
    pub n_neighbors: usize,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: ClusterMode::Deterministic,
            num_clusters: 5,
            min_cluster_size: 5,
            n_components: 5,
            n_neighbors: 15,
            seed: 42,
        }
    }
}

/// K-means over the rows of `data`. Labels are 0..k.
///
/// Initialisation is seeded from `seed`, so the same corpus always yields
/// the same partition. A corpus with a single distinct row is one cluster.
pub fn kmeans(data: &Array2<f64>, num_clusters: usize, seed: u64) -> Result<Vec<i32>> {
    if data.nrows() == 0 || data.ncols() == 0 {
        anyhow::bail!(
            "K-means needs a non-empty matrix, got {} rows x {} columns",
            data.nrows(),
            data.ncols()
        );
    }
    let k = num_clusters.min(distinct_rows(data)).max(1);
    if k == 1 {
        debug!(docs = data.nrows(), "Single distinct point, one cluster");
        return Ok(vec![0; data.nrows()]);
    }

    let dataset = DatasetBase::from(data.clone());
    let model = KMeans::params_with_rng(k, Xoshiro256Plus::seed_from_u64(seed))
        .n_runs(10)
        .max_n_iterations(300)
        .tolerance(1e-4)
        .fit(&dataset)
        .map_err(|e| anyhow::anyhow!("K-means fit failed: {:?}", e))?;

    let labels = model.predict(data);
    debug!(k, seed, docs = data.nrows(), "K-means clustering complete");
    Ok(labels.iter().map(|&l| l as i32).collect())
}

/// DBSCAN over the rows of `data`. Noise points get OUTLIER.
pub fn dbscan(data: &Array2<f64>, min_cluster_size: usize) -> Result<Vec<i32>> {
    let n = data.nrows();
    let min_points = min_cluster_size.clamp(2, n.max(2));
    let tolerance = adaptive_radius(data, min_points - 1);

    let params = Dbscan::params(min_points)
        .tolerance(tolerance)
        .check()
        .map_err(|e| anyhow::anyhow!("Invalid DBSCAN parameters: {:?}", e))?;
    let memberships = params.transform(data);

    let labels: Vec<i32> = memberships
        .iter()
        .map(|m| m.map(|c| c as i32).unwrap_or(OUTLIER))
        .collect();

    debug!(
        min_points,
        tolerance,
        outliers = labels.iter().filter(|&&l| l == OUTLIER).count(),
        "DBSCAN clustering complete"
    );
    Ok(labels)
}

/// Median distance from each point to its k-th nearest neighbour.
fn adaptive_radius(data: &Array2<f64>, k: usize) -> f64 {
    let n = data.nrows();
    if n < 2 {
        return 1e-6;
    }
    let k = k.clamp(1, n - 1);

    let mut kth: Vec<f64> = data
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, row)| {
            let mut dists: Vec<f64> = data
                .axis_iter(Axis(0))
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| euclidean(row, other))
                .collect();
            dists.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            dists[k - 1]
        })
        .collect();
    kth.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    kth[kth.len() / 2].max(1e-6)
}

/// Per-document membership weights over topics 0..n_topics.
///
/// Weight for topic t is proportional to the inverse distance from the
/// document to t's centroid. Rows sum to 1. Outlier documents get a row
/// too, which is how the density mode exposes soft assignments.
pub fn soft_probabilities(data: &Array2<f64>, labels: &[i32], n_topics: usize) -> Vec<Vec<f32>> {
    if n_topics == 0 {
        return vec![Vec::new(); data.nrows()];
    }

    let dim = data.ncols();
    let mut centroids = vec![vec![0.0_f64; dim]; n_topics];
    let mut counts = vec![0usize; n_topics];
    for (row, &label) in data.axis_iter(Axis(0)).zip(labels.iter()) {
        if label < 0 || label as usize >= n_topics {
            continue;
        }
        let t = label as usize;
        counts[t] += 1;
        for (acc, v) in centroids[t].iter_mut().zip(row.iter()) {
            *acc += v;
        }
    }
    for (centroid, &count) in centroids.iter_mut().zip(counts.iter()) {
        if count > 0 {
            centroid.iter_mut().for_each(|v| *v /= count as f64);
        }
    }

    data.axis_iter(Axis(0))
        .map(|row| {
            let inv: Vec<f64> = centroids
                .iter()
                .map(|c| 1.0 / (euclidean(row, ArrayView1::from(c.as_slice())) + 1e-6))
                .collect();
            let total: f64 = inv.iter().sum();
            inv.iter().map(|w| (w / total) as f32).collect()
        })
        .collect()
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Number of distinct rows, so k-means never asks for more centroids than
/// there are distinct points.
fn distinct_rows(data: &Array2<f64>) -> usize {
    let mut seen: Vec<Vec<u64>> = Vec::new();
    for row in data.axis_iter(Axis(0)) {
        let bits: Vec<u64> = row.iter().map(|v| v.to_bits()).collect();
        if !seen.contains(&bits) {
            seen.push(bits);
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
        ]
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(ClusterMode::parse("Density"), Some(ClusterMode::Density));
        assert_eq!(ClusterMode::parse("kmeans"), Some(ClusterMode::Deterministic));
        assert_eq!(ClusterMode::parse("umap"), None);
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let labels = kmeans(&blobs(), 2, 42).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_kmeans_clamps_k_to_distinct_points() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [2.0, 2.0]];
        let labels = kmeans(&data, 5, 42).unwrap();
        assert!(labels.iter().all(|&l| l == 0 || l == 1));
    }

    #[test]
    fn test_kmeans_identical_rows_single_cluster() {
        let data = Array2::from_elem((10, 3), 0.25);
        assert_eq!(kmeans(&data, 5, 42).unwrap(), vec![0; 10]);
    }

    #[test]
    fn test_kmeans_rejects_zero_columns() {
        let data = Array2::<f64>::zeros((10, 0));
        assert!(kmeans(&data, 5, 42).is_err());
    }

    #[test]
    fn test_kmeans_seed_is_reproducible() {
        assert_eq!(kmeans(&blobs(), 2, 7).unwrap(), kmeans(&blobs(), 2, 7).unwrap());
    }

    #[test]
    fn test_soft_probabilities_rows_sum_to_one() {
        let labels = vec![0, 0, 0, 1, 1, 1];
        let probs = soft_probabilities(&blobs(), &labels, 2);
        for row in &probs {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
        assert!(probs[0][0] > probs[0][1]);
        assert!(probs[4][1] > probs[4][0]);
    }

    #[test]
    fn test_soft_probabilities_without_topics() {
        let probs = soft_probabilities(&blobs(), &[OUTLIER; 6], 0);
        assert!(probs.iter().all(|r| r.is_empty()));
    }
}
