//! Centroid partition of the corpus vectors.
//!
//! K-means from `linfa-clustering`, seeded with a fixed ChaCha generator so
//! identical inputs always produce identical labels. Corpus labels and query
//! assignments both come from the fitted model's `predict`, so a recipe's
//! stored label is always its nearest centroid.

use crate::error::{Error, Result};
use crate::indexer::vectorizer::SparseVector;
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use tracing::{debug, info};

const TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansParams {
    pub clusters: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iter: usize,
}

/// Cluster count actually used for `n` recipes.
///
/// Small corpora (fewer than twice the requested count) fall back to
/// `max(2, n / 2)`; the count never exceeds the number of recipes.
pub fn effective_clusters(requested: usize, n: usize) -> usize {
    let k = if n < requested.saturating_mul(2) {
        (n / 2).max(2)
    } else {
        requested
    };
    k.min(n)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CentroidIndex {
    model: Option<KMeans<f64, L2Dist>>,
    labels: Vec<usize>,
    clusters: usize,
}

impl CentroidIndex {
    pub fn fit(vectors: &[SparseVector], params: &KMeansParams) -> Result<Self> {
        let n = vectors.len();
        let mut k = effective_clusters(params.clusters, n);
        if k != params.clusters {
            info!(
                "Adjusted number of centroid clusters from {} to {} for {} recipes",
                params.clusters, k, n
            );
        }

        // k-means++ cannot place more centroids than there are distinct points
        let distinct = distinct_vectors(vectors);
        if distinct < k {
            debug!("Only {} distinct vectors, clustering into {}", distinct, distinct);
            k = distinct;
        }
        if k == 0 {
            return Ok(Self::default());
        }

        let data = dense_matrix(vectors);
        let dataset = DatasetBase::from(data.clone());
        let model = KMeans::params_with_rng(k, ChaCha8Rng::seed_from_u64(params.seed))
            .n_runs(params.restarts.max(1))
            .max_n_iterations(params.max_iter.max(1) as u64)
            .tolerance(TOLERANCE)
            .fit(&dataset)
            .map_err(|e| Error::Internal(format!("K-means fit failed: {e}")))?;

        let labels: Array1<usize> = model.predict(&data);
        info!(
            "Applied k-means clustering with {} clusters (inertia {:.4})",
            k,
            model.inertia()
        );

        Ok(Self {
            model: Some(model),
            labels: labels.to_vec(),
            clusters: k,
        })
    }

    /// Nearest centroid for any vector of the fitted dimension.
    pub fn assign(&self, vector: &SparseVector) -> usize {
        match &self.model {
            Some(model) => {
                let point = Array1::from(vector.to_dense()).insert_axis(Axis(0));
                let label: Array1<usize> = model.predict(&point);
                label.first().copied().unwrap_or(0)
            }
            None => 0,
        }
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters
    }

    /// Positions of the recipes labelled `cluster`, in corpus order.
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, &label)| label == cluster)
            .map(|(i, _)| i)
    }

    #[cfg(test)]
    pub(crate) fn relabel(&mut self, labels: Vec<usize>) {
        self.labels = labels;
    }
}

fn dense_matrix(vectors: &[SparseVector]) -> Array2<f64> {
    let dim = vectors.first().map(SparseVector::len).unwrap_or(0);
    let mut data = Array2::zeros((vectors.len(), dim));
    for (i, v) in vectors.iter().enumerate() {
        for &(j, x) in v.entries() {
            data[[i, j]] = x;
        }
    }
    data
}

fn distinct_vectors(vectors: &[SparseVector]) -> usize {
    vectors
        .iter()
        .map(|v| {
            v.entries()
                .iter()
                .map(|&(j, x)| (j, x.to_bits()))
                .collect::<Vec<_>>()
        })
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(dim: usize, pairs: &[(usize, f64)]) -> SparseVector {
        SparseVector::from_pairs(dim, pairs.iter().copied())
    }

    fn two_blobs() -> Vec<SparseVector> {
        vec![
            point(3, &[(0, 1.0)]),
            point(3, &[(0, 0.9), (1, 0.1)]),
            point(3, &[(2, 1.0)]),
            point(3, &[(2, 0.95), (1, 0.05)]),
            point(3, &[(0, 0.95)]),
            point(3, &[(2, 0.9)]),
        ]
    }

    const PARAMS: KMeansParams = KMeansParams {
        clusters: 2,
        seed: 42,
        restarts: 10,
        max_iter: 300,
    };

    #[test]
    fn test_effective_clusters() {
        assert_eq!(effective_clusters(20, 100), 20);
        assert_eq!(effective_clusters(20, 40), 20);
        assert_eq!(effective_clusters(20, 39), 19);
        assert_eq!(effective_clusters(20, 10), 5);
        assert_eq!(effective_clusters(20, 3), 2);
        assert_eq!(effective_clusters(20, 2), 2);
        assert_eq!(effective_clusters(20, 1), 1);
        assert_eq!(effective_clusters(50, 0), 0);
    }

    #[test]
    fn test_separates_blobs() {
        let vectors = two_blobs();
        let index = CentroidIndex::fit(&vectors, &PARAMS).unwrap();
        let labels = index.labels();

        assert_eq!(index.cluster_count(), 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[4]);
        assert_eq!(labels[2], labels[3]);
        assert_eq!(labels[2], labels[5]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_assign_matches_fitted_labels() {
        let vectors = two_blobs();
        // a single iteration stops well before convergence
        for max_iter in [1, 300] {
            let params = KMeansParams {
                max_iter,
                restarts: 1,
                ..PARAMS
            };
            let index = CentroidIndex::fit(&vectors, &params).unwrap();
            for (v, &label) in vectors.iter().zip(index.labels()) {
                assert_eq!(index.assign(v), label);
            }
        }

        let index = CentroidIndex::fit(&vectors, &PARAMS).unwrap();
        assert_eq!(index.assign(&point(3, &[(0, 0.7)])), index.labels()[0]);
        assert_eq!(index.assign(&point(3, &[(2, 0.7)])), index.labels()[2]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let vectors = two_blobs();
        let params = KMeansParams {
            clusters: 3,
            ..PARAMS
        };
        let first = CentroidIndex::fit(&vectors, &params).unwrap();
        let second = CentroidIndex::fit(&vectors, &params).unwrap();
        assert_eq!(first.labels(), second.labels());
        assert_eq!(first, second);
    }

    #[test]
    fn test_members_in_corpus_order() {
        let vectors = two_blobs();
        let index = CentroidIndex::fit(&vectors, &PARAMS).unwrap();
        let cluster = index.labels()[2];
        assert_eq!(index.members(cluster).collect::<Vec<_>>(), vec![2, 3, 5]);
    }

    #[test]
    fn test_identical_vectors_limit_cluster_count() {
        let vectors = vec![point(2, &[(0, 1.0)]); 4];
        let index = CentroidIndex::fit(&vectors, &PARAMS).unwrap();
        assert_eq!(index.cluster_count(), 1);
        assert_eq!(index.labels(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_single_recipe_and_empty_input() {
        let single = vec![point(2, &[(1, 1.0)])];
        let index = CentroidIndex::fit(&single, &PARAMS).unwrap();
        assert_eq!(index.cluster_count(), 1);
        assert_eq!(index.labels(), &[0]);
        assert_eq!(index.assign(&point(2, &[(0, 1.0)])), 0);

        let empty = CentroidIndex::fit(&[], &PARAMS).unwrap();
        assert_eq!(empty.cluster_count(), 0);
        assert!(empty.labels().is_empty());
        assert_eq!(empty.assign(&point(2, &[])), 0);
    }
}
