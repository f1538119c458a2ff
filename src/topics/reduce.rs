// Dimensionality reduction ahead of clustering.
//
// Two reducers, one per clustering mode:
// - PCA (linear, deterministic) for k-means
// - spectral embedding of the cosine k-nearest-neighbour graph (nonlinear,
//   seeded) for density clustering
//
// Both clamp the requested component count to what the corpus supports, so
// a three-document corpus still goes through cleanly.

use anyhow::{Context, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::embeddings::cosine_similarity;

const POWER_ITERATIONS: usize = 200;

/// Stack embeddings into an (n_docs, dim) matrix.
pub fn to_matrix(embeddings: &[Vec<f32>]) -> Result<Array2<f64>> {
    let n = embeddings.len();
    let dim = embeddings.first().map(|e| e.len()).unwrap_or(0);
    if n == 0 || dim == 0 {
        anyhow::bail!("Cannot build an embedding matrix from {n} vectors of dimension {dim}");
    }
    if let Some(bad) = embeddings.iter().position(|e| e.len() != dim) {
        anyhow::bail!(
            "Embedding {bad} has dimension {}, expected {dim}",
            embeddings[bad].len()
        );
    }

    let flat: Vec<f64> = embeddings
        .iter()
        .flat_map(|e| e.iter().map(|&v| v as f64))
        .collect();
    Array2::from_shape_vec((n, dim), flat).context("Embedding matrix has an invalid shape")
}

/// Project onto the top principal components.
///
/// Corpora too small to have more than `n_components` directions of
/// variance are returned unreduced, as is any corpus the decomposition
/// cannot handle. Zero-variance input (every row identical) projects onto
/// no components at all, so it also falls back to the raw rows.
pub fn pca(data: &Array2<f64>, n_components: usize) -> Result<Array2<f64>> {
    let (n_samples, n_features) = data.dim();
    if n_samples == 0 || n_features == 0 {
        anyhow::bail!("Cannot reduce an empty matrix");
    }
    let n_components = n_components.min(n_features).max(1);
    if n_samples <= n_components + 1 {
        debug!(samples = n_samples, "Corpus too small for PCA, skipping reduction");
        return Ok(data.clone());
    }

    let dataset = DatasetBase::from(data.clone());
    let model = match Pca::params(n_components).fit(&dataset) {
        Ok(model) => model,
        Err(e) => {
            warn!(error = ?e, samples = n_samples, "PCA failed, clustering unreduced embeddings");
            return Ok(data.clone());
        }
    };
    let projected: Array2<f64> = model.predict(data);

    if projected.ncols() == 0 || projected.iter().any(|v| !v.is_finite()) {
        warn!(
            samples = n_samples,
            components = projected.ncols(),
            "PCA found no usable variance, clustering unreduced embeddings"
        );
        return Ok(data.clone());
    }

    debug!(
        samples = n_samples,
        components = projected.ncols(),
        "PCA reduction complete"
    );
    Ok(projected)
}

/// Spectral embedding of the symmetric cosine kNN graph.
///
/// Edge weights use per-point local scaling: w_ij = exp(-(1 - cos_ij) / sigma_i)
/// where sigma_i is the mean cosine distance to i's neighbours. Coordinates
/// are the leading non-trivial eigenvectors of the normalised adjacency,
/// found by seeded power iteration with deflation.
pub fn spectral(
    embeddings: &[Vec<f32>],
    n_components: usize,
    n_neighbors: usize,
    seed: u64,
) -> Result<Array2<f64>> {
    let n = embeddings.len();
    if n < 2 {
        anyhow::bail!("Spectral embedding needs at least 2 documents, got {n}");
    }
    let k = n_neighbors.clamp(1, n - 1);
    let n_components = n_components.clamp(1, n - 1);

    let mut weights = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        let mut neighbours: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| {
                let sim = cosine_similarity(&embeddings[i], &embeddings[j]) as f64;
                (j, 1.0 - sim)
            })
            .collect();
        neighbours.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbours.truncate(k);

        let sigma = (neighbours.iter().map(|(_, d)| d).sum::<f64>() / k as f64).max(1e-6);
        for (j, dist) in neighbours {
            let w = (-dist / sigma).exp();
            // Symmetrise with max so the graph is undirected.
            if w > weights[[i, j]] {
                weights[[i, j]] = w;
                weights[[j, i]] = w;
            }
        }
    }

    let degrees = weights.sum_axis(Axis(1));
    let inv_sqrt = degrees.mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 });

    // Lazy normalised adjacency (I + D^-1/2 W D^-1/2) / 2 has eigenvalues in
    // [0, 1], so power iteration converges to the leading ones.
    let scale = Array2::from_shape_fn((n, n), |(i, j)| inv_sqrt[i] * inv_sqrt[j]);
    let op = (&weights * &scale) * 0.5 + Array2::<f64>::eye(n) * 0.5;

    // The trivial eigenvector is proportional to sqrt(degree).
    let mut basis: Vec<Array1<f64>> = vec![normalized(degrees.mapv(f64::sqrt))];
    let mut rng = StdRng::seed_from_u64(seed);
    let mut coords = Array2::zeros((n, n_components));

    for c in 0..n_components {
        let mut v: Array1<f64> = (0..n).map(|_| rng.random::<f64>() - 0.5).collect();
        orthogonalize(&mut v, &basis);
        v = normalized(v);

        for _ in 0..POWER_ITERATIONS {
            let mut next = op.dot(&v);
            orthogonalize(&mut next, &basis);
            let next = normalized(next);
            if next.iter().all(|x| *x == 0.0) {
                break;
            }
            v = next;
        }

        coords.column_mut(c).assign(&(&v * &inv_sqrt));
        basis.push(v);
    }

    debug!(
        samples = n,
        neighbors = k,
        components = n_components,
        "Spectral reduction complete"
    );
    Ok(coords)
}

fn orthogonalize(v: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for b in basis {
        let dot = v.dot(b);
        v.scaled_add(-dot, b);
    }
}

fn normalized(v: Array1<f64>) -> Array1<f64> {
    let norm = v.dot(&v).sqrt();
    if norm > 1e-12 {
        v / norm
    } else {
        Array1::zeros(v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0, 0.0, 0.1],
            vec![0.9, 0.1, 0.0, 0.0],
            vec![0.0, 1.0, 0.1, 0.0],
            vec![0.1, 0.9, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.2],
            vec![0.0, 0.1, 0.9, 0.1],
        ]
    }

    #[test]
    fn test_to_matrix_rejects_ragged_input() {
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(to_matrix(&ragged).is_err());
    }

    #[test]
    fn test_pca_skips_tiny_corpus() {
        let data = to_matrix(&sample()[..3]).unwrap();
        let projected = pca(&data, 5).unwrap();
        assert_eq!(projected, data);
    }

    #[test]
    fn test_pca_identical_rows_fall_back_to_raw() {
        let same = vec![vec![0.5, 0.5, 0.0, 0.1]; 10];
        let data = to_matrix(&same).unwrap();
        let projected = pca(&data, 5).unwrap();
        assert_eq!(projected.dim(), (10, 4));
        assert_eq!(projected, data);
    }

    #[test]
    fn test_pca_keeps_rows() {
        let data = to_matrix(&sample()).unwrap();
        let projected = pca(&data, 2).unwrap();
        assert_eq!(projected.nrows(), 6);
        assert!(projected.ncols() <= 4);
    }

    #[test]
    fn test_spectral_shape_and_determinism() {
        let a = spectral(&sample(), 5, 2, 42).unwrap();
        let b = spectral(&sample(), 5, 2, 42).unwrap();
        assert_eq!(a.dim(), (6, 5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_spectral_needs_two_documents() {
        assert!(spectral(&sample()[..1], 5, 2, 42).is_err());
    }
}
