//! Agglomerative (Ward linkage) partition of the corpus vectors.
//!
//! The dendrogram comes from `kodama` over a condensed matrix of Euclidean
//! distances. Ward is monotone, so applying the first `n - k` merges yields
//! the `k`-cluster cut. Only recipes present at fit time are labelled; there
//! is no assignment for new vectors.

use crate::indexer::cluster::effective_clusters;
use crate::indexer::vectorizer::SparseVector;
use kodama::{linkage, Method};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyIndex {
    labels: Vec<usize>,
    clusters: usize,
}

impl HierarchyIndex {
    pub fn fit(vectors: &[SparseVector], requested: usize) -> Self {
        let n = vectors.len();
        let k = effective_clusters(requested, n);
        if k != requested {
            info!(
                "Adjusted number of hierarchical clusters from {} to {} for {} recipes",
                requested, k, n
            );
        }
        if n <= 1 {
            return Self {
                labels: vec![0; n],
                clusters: n,
            };
        }

        let mut condensed = condensed_distances(vectors);
        let dendrogram = linkage(&mut condensed, n, Method::Ward);

        // node ids below n are recipes; step i creates node n + i
        let mut parent: Vec<usize> = (0..n).collect();
        let mut leaf_of_node: Vec<usize> = (0..n).collect();
        for step in dendrogram.steps().iter().take(n - k) {
            let (a, b) = (leaf_of_node[step.cluster1], leaf_of_node[step.cluster2]);
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
            leaf_of_node.push(a);
        }

        // number clusters by first appearance in corpus order
        let mut label_of_root = vec![usize::MAX; n];
        let mut labels = Vec::with_capacity(n);
        let mut next = 0;
        for i in 0..n {
            let root = find(&mut parent, i);
            if label_of_root[root] == usize::MAX {
                label_of_root[root] = next;
                next += 1;
            }
            labels.push(label_of_root[root]);
        }

        info!("Applied hierarchical clustering with {} clusters", next);
        Self {
            labels,
            clusters: next,
        }
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters
    }

    pub fn label_of(&self, position: usize) -> Option<usize> {
        self.labels.get(position).copied()
    }

    /// Positions of the recipes labelled `cluster`, in corpus order.
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, &label)| label == cluster)
            .map(|(i, _)| i)
    }
}

/// Upper triangle of the Euclidean distance matrix, row by row, without the
/// diagonal.
fn condensed_distances(vectors: &[SparseVector]) -> Vec<f64> {
    let n = vectors.len();
    let norms: Vec<f64> = vectors.iter().map(|v| v.dot(v)).collect();
    let mut data = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            let squared = norms[i] + norms[j] - 2.0 * vectors[i].dot(&vectors[j]);
            data.push(squared.max(0.0).sqrt());
        }
    }
    data
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(dim: usize, pairs: &[(usize, f64)]) -> SparseVector {
        SparseVector::from_pairs(dim, pairs.iter().copied())
    }

    fn line(xs: &[f64]) -> Vec<SparseVector> {
        xs.iter().map(|&x| point(1, &[(0, x)])).collect()
    }

    #[test]
    fn test_groups_nearby_points() {
        let vectors = line(&[0.0, 0.1, 5.0, 5.2, 10.0, 10.1, 0.2]);
        let index = HierarchyIndex::fit(&vectors, 3);
        let labels = index.labels();

        assert_eq!(index.cluster_count(), 3);
        assert_eq!(labels, &[0, 0, 1, 1, 2, 2, 0]);
    }

    #[test]
    fn test_small_corpus_policy() {
        // 4 recipes with a requested 50 clusters -> max(2, 4 / 2) = 2
        let vectors = line(&[0.0, 0.1, 9.0, 9.1]);
        let index = HierarchyIndex::fit(&vectors, 50);
        assert_eq!(index.cluster_count(), 2);
        assert_eq!(index.labels(), &[0, 0, 1, 1]);
        assert_eq!(index.members(1).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(index.label_of(3), Some(1));
        assert_eq!(index.label_of(4), None);
    }

    #[test]
    fn test_ward_prefers_balanced_merge() {
        // a tight pair, a second pair and an outlier; the outlier stays alone
        let vectors = vec![
            point(2, &[(0, 1.0)]),
            point(2, &[(0, 1.0), (1, 0.1)]),
            point(2, &[(1, 1.0)]),
            point(2, &[(1, 1.1)]),
            point(2, &[(0, 8.0), (1, 8.0)]),
            point(2, &[(0, 0.9)]),
        ];
        let index = HierarchyIndex::fit(&vectors, 3);
        let labels = index.labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[5]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        assert_ne!(labels[4], labels[0]);
        assert_ne!(labels[4], labels[2]);
    }

    #[test]
    fn test_deterministic_and_degenerate_inputs() {
        let vectors = line(&[1.0, 1.0, 1.0, 1.0]);
        let a = HierarchyIndex::fit(&vectors, 2);
        let b = HierarchyIndex::fit(&vectors, 2);
        assert_eq!(a, b);
        assert_eq!(a.cluster_count(), 2);

        let single = HierarchyIndex::fit(&line(&[3.0]), 50);
        assert_eq!(single.labels(), &[0]);
        assert_eq!(single.cluster_count(), 1);

        let empty = HierarchyIndex::fit(&[], 50);
        assert_eq!(empty.cluster_count(), 0);
    }
}
