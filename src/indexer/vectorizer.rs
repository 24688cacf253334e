use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Fixed-dimension vector storing only its non-zero entries, sorted by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    /// Build from unordered `(index, value)` pairs. Zero values are dropped.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut entries: Vec<(usize, f64)> = pairs
            .into_iter()
            .filter(|&(i, v)| i < dim && v != 0.0)
            .collect();
        entries.sort_by_key(|&(i, _)| i);
        entries.dedup_by_key(|&mut (i, _)| i);
        Self { dim, entries }
    }

    /// Dimensionality, i.e. the vocabulary size, not the non-zero count.
    pub fn len(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (a, b) = (&self.entries, &other.entries);
        let (mut p, mut q) = (0, 0);
        let mut sum = 0.0;
        while p < a.len() && q < b.len() {
            match a[p].0.cmp(&b[q].0) {
                std::cmp::Ordering::Less => p += 1,
                std::cmp::Ordering::Greater => q += 1,
                std::cmp::Ordering::Equal => {
                    sum += a[p].1 * b[q].1;
                    p += 1;
                    q += 1;
                }
            }
        }
        sum
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt()
    }

    /// Cosine similarity; 0.0 when either side is the zero vector.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        let denom = self.norm() * other.norm();
        if denom == 0.0 {
            0.0
        } else {
            self.dot(other) / denom
        }
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for &(i, v) in &self.entries {
            dense[i] = v;
        }
        dense
    }
}

/// Parameters of one fit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorizerParams {
    pub max_features: usize,
    pub min_df: usize,
    pub ngram_max: usize,
}

impl VectorizerParams {
    /// Backup parameters used when the first fit leaves nothing: unigrams only,
    /// every term kept regardless of document frequency.
    pub fn relaxed(&self) -> Self {
        Self {
            max_features: self.max_features,
            min_df: 1,
            ngram_max: 1,
        }
    }
}

/// TF-IDF model: term -> feature index plus smoothed inverse document
/// frequency per feature. Indices follow the terms' sorted order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    ngram_max: usize,
    relaxed: bool,
}

impl Vectorizer {
    /// Fit a vocabulary over `documents` and return one vector per document.
    ///
    /// If the configured parameters leave no terms, the fit is retried once
    /// with `VectorizerParams::relaxed`. `Error::VocabularyEmpty` surfaces only
    /// when that retry is empty as well.
    pub fn fit_transform(
        documents: &[&str],
        params: &VectorizerParams,
    ) -> Result<(Self, Vec<SparseVector>)> {
        let vectorizer = match Self::fit(documents, params, false) {
            Ok(v) => v,
            Err(Error::VocabularyEmpty) => {
                warn!(
                    "Empty vocabulary with min_df={} ngram_max={}, retrying with relaxed parameters",
                    params.min_df, params.ngram_max
                );
                Self::fit(documents, &params.relaxed(), true)?
            }
            Err(e) => return Err(e),
        };

        let vectors = documents.iter().map(|d| vectorizer.transform(d)).collect();
        Ok((vectorizer, vectors))
    }

    fn fit(documents: &[&str], params: &VectorizerParams, relaxed: bool) -> Result<Self> {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let grams = ngrams(doc, params.ngram_max);
            let unique: HashSet<&str> = grams.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term.to_string()).or_insert(0) += 1;
            }
            for term in grams {
                *term_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut kept: Vec<(String, usize)> = term_freq
            .into_iter()
            .filter(|(term, _)| doc_freq.get(term).copied().unwrap_or(0) >= params.min_df)
            .collect();

        if kept.is_empty() {
            return Err(Error::VocabularyEmpty);
        }

        // most frequent first, alphabetical among equals
        kept.sort_by(|(a_term, a_count), (b_term, b_count)| {
            b_count.cmp(a_count).then_with(|| a_term.cmp(b_term))
        });
        kept.truncate(params.max_features);

        let vocabulary: BTreeMap<String, usize> = {
            let mut terms: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();
            terms.sort();
            terms.into_iter().enumerate().map(|(i, t)| (t, i)).collect()
        };

        let n = documents.len() as f64;
        let mut idf = vec![0.0; vocabulary.len()];
        for (term, &index) in &vocabulary {
            let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
            idf[index] = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
        }

        info!(
            "Fitted vocabulary with {} features over {} documents{}",
            vocabulary.len(),
            documents.len(),
            if relaxed { " (relaxed parameters)" } else { "" }
        );
        debug!(
            "Sample features: {}",
            vocabulary.keys().take(10).cloned().collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            vocabulary,
            idf,
            ngram_max: params.ngram_max,
            relaxed,
        })
    }

    /// Project text into the fitted space. Unknown terms are ignored; text
    /// with no known terms yields the zero vector of full dimension.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for gram in ngrams(text, self.ngram_max) {
            if let Some(&index) = self.vocabulary.get(&gram) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, count)| (index, count * self.idf[index]))
            .collect();
        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return SparseVector::zeros(self.dim());
        }

        SparseVector::from_pairs(self.dim(), weighted.into_iter().map(|(i, w)| (i, w / norm)))
    }

    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    /// Whether this model came from the relaxed backup fit.
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    #[cfg(test)]
    pub(crate) fn terms(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn index_of(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Unigrams followed by (when `ngram_max >= 2`) space-joined bigrams.
fn ngrams(text: &str, ngram_max: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let mut grams = tokens.clone();
    if ngram_max >= 2 {
        grams.extend(tokens.windows(2).map(|pair| pair.join(" ")));
    }
    grams
}
