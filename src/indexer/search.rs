//! Tiered ingredient search over a fitted [`Corpus`].
//!
//! Strategies run in a fixed order and the first one producing results wins:
//! exact containment, then cosine similarity inside the query's centroid
//! cluster, then ingredient overlap across the whole corpus. The last tier
//! always answers for a non-empty corpus.

use crate::error::{Error, Result};
use crate::indexer::corpus::Corpus;
use crate::indexer::normalizer::normalize;
use crate::indexer::recipe::{Recipe, RecipeId};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "exact")]
    ExactMatch,
    #[serde(rename = "cluster")]
    ClusterSimilarity,
    #[serde(rename = "fallback")]
    OverlapFallback,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::ExactMatch => "exact",
            Tier::ClusterSimilarity => "cluster",
            Tier::OverlapFallback => "fallback",
        }
    }

    /// Human readable name of the strategy.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::ExactMatch => "Exact Match",
            Tier::ClusterSimilarity => "KMeans Clustering",
            Tier::OverlapFallback => "Ingredient Overlap",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized ingredient query. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    ingredients: Vec<String>,
}

impl Query {
    /// Normalize caller input with the corpus rules. Inputs that normalize to
    /// nothing are dropped; if none survive the query is rejected.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let ingredients: Vec<String> = raw
            .iter()
            .map(|s| normalize(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();

        if ingredients.is_empty() {
            return Err(Error::QueryOutOfDomain);
        }
        Ok(Self { ingredients })
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    /// Synthetic document fed to the vectorizer.
    pub fn document(&self) -> String {
        self.ingredients.join(" ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult<'a> {
    pub recipe: &'a Recipe,
    /// Unset for exact matches.
    pub score: Option<f64>,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome<'a> {
    /// The normalized query ingredients.
    pub ingredients: Vec<String>,
    pub results: Vec<SearchResult<'a>>,
    /// Tier that produced `results`; `None` only for an empty corpus.
    pub method: Option<Tier>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation<'a> {
    pub recipe: &'a Recipe,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub recipes: usize,
    pub features: usize,
    pub relaxed_vocabulary: bool,
    pub centroid_clusters: usize,
    pub hierarchical_clusters: usize,
    pub excluded_records: usize,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
}

/// Corpus position plus optional score.
type Scored = (usize, Option<f64>);

type Strategy = fn(&Query, &Corpus) -> Option<Vec<Scored>>;

const STRATEGIES: [(Tier, Strategy); 3] = [
    (Tier::ExactMatch, exact_containment),
    (Tier::ClusterSimilarity, cluster_similarity),
    (Tier::OverlapFallback, overlap_fallback),
];

/// Read-only view over one corpus snapshot.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    corpus: &'a Corpus,
}

impl<'a> QueryEngine<'a> {
    pub fn new(corpus: &'a Corpus) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &'a Corpus {
        self.corpus
    }

    /// Run the tiered search and keep at most `max_results` results.
    ///
    /// Fails only with `Error::QueryOutOfDomain` when no query ingredient
    /// survives normalization.
    pub fn search<S: AsRef<str>>(
        &self,
        ingredients: &[S],
        max_results: usize,
    ) -> Result<SearchOutcome<'a>> {
        let query = Query::parse(ingredients)?;
        debug!("Searching for {:?}", query.ingredients());

        if self.corpus.is_empty() {
            return Ok(SearchOutcome {
                ingredients: query.ingredients,
                results: Vec::new(),
                method: None,
            });
        }

        for (tier, strategy) in STRATEGIES {
            let Some(mut scored) = strategy(&query, self.corpus) else {
                debug!("Tier {} produced nothing", tier);
                continue;
            };
            if scored.is_empty() {
                continue;
            }
            scored.truncate(max_results);
            debug!("Tier {} answered with {} results", tier, scored.len());

            let entries = self.corpus.entries();
            let results = scored
                .into_iter()
                .map(|(position, score)| SearchResult {
                    recipe: &entries[position].recipe,
                    score,
                    tier,
                })
                .collect();
            return Ok(SearchOutcome {
                ingredients: query.ingredients,
                results,
                method: Some(tier),
            });
        }

        Ok(SearchOutcome {
            ingredients: query.ingredients,
            results: Vec::new(),
            method: None,
        })
    }

    /// Recipes most similar to the recipe `id`.
    ///
    /// Candidates come from the recipe's hierarchical cluster; when it holds
    /// no other recipe, its centroid cluster is used instead, and failing that
    /// the whole corpus. Ranked by cosine similarity, ties in corpus order.
    pub fn similar_to(&self, id: RecipeId, max_results: usize) -> Result<Vec<Recommendation<'a>>> {
        let corpus = self.corpus;
        let seed = corpus
            .position(id)
            .ok_or_else(|| Error::NotFound(format!("Recipe {id} not found")))?;
        let entries = corpus.entries();
        let seed_entry = &entries[seed];

        let mut candidates: Vec<usize> = corpus
            .hierarchy()
            .members(seed_entry.hierarchical_cluster)
            .filter(|&p| p != seed)
            .collect();
        if candidates.is_empty() {
            debug!("Recipe {} is alone in its hierarchical cluster, using centroid cluster", id);
            candidates = corpus
                .centroids()
                .members(seed_entry.centroid_cluster)
                .filter(|&p| p != seed)
                .collect();
        }
        if candidates.is_empty() {
            candidates = (0..entries.len()).filter(|&p| p != seed).collect();
        }

        let mut ranked: Vec<(usize, f64)> = candidates
            .into_iter()
            .map(|p| (p, seed_entry.vector.cosine(&entries[p].vector)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(max_results);

        Ok(ranked
            .into_iter()
            .map(|(p, score)| Recommendation {
                recipe: &entries[p].recipe,
                score,
            })
            .collect())
    }

    /// Every distinct normalized ingredient in the corpus, sorted.
    pub fn ingredients(&self) -> Vec<&'a str> {
        let unique: BTreeSet<&'a str> = self
            .corpus
            .entries()
            .iter()
            .flat_map(|e| e.recipe.ingredients_simple.iter().map(String::as_str))
            .collect();
        unique.into_iter().collect()
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&'a Recipe> {
        self.corpus.get(id).map(|e| &e.recipe)
    }

    pub fn random_recipe<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&'a Recipe> {
        self.corpus.entries().choose(rng).map(|e| &e.recipe)
    }

    pub fn stats(&self) -> CorpusStats {
        let corpus = self.corpus;
        CorpusStats {
            recipes: corpus.len(),
            features: corpus.vectorizer().dim(),
            relaxed_vocabulary: corpus.vectorizer().is_relaxed(),
            centroid_clusters: corpus.centroids().cluster_count(),
            hierarchical_clusters: corpus.hierarchy().cluster_count(),
            excluded_records: corpus.excluded(),
            generation: corpus.generation(),
            built_at: corpus.built_at(),
        }
    }
}

/// Recipes where every query ingredient is a substring of some recipe
/// ingredient. Unscored, corpus order.
fn exact_containment(query: &Query, corpus: &Corpus) -> Option<Vec<Scored>> {
    let matches: Vec<Scored> = corpus
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| query.ingredients().iter().all(|q| e.recipe.has_ingredient(q)))
        .map(|(p, _)| (p, None))
        .collect();

    (!matches.is_empty()).then_some(matches)
}

/// Cosine similarity against the members of the query's nearest centroid.
fn cluster_similarity(query: &Query, corpus: &Corpus) -> Option<Vec<Scored>> {
    let vector = corpus.vectorizer().transform(&query.document());
    if vector.is_zero() {
        debug!("Query has no terms in the vocabulary");
        return None;
    }
    let cluster = corpus.centroids().assign(&vector);
    let entries = corpus.entries();

    let mut scored: Vec<(usize, f64)> = corpus
        .centroids()
        .members(cluster)
        .map(|p| (p, vector.cosine(&entries[p].vector)))
        .collect();
    if scored.is_empty() {
        debug!("Centroid cluster {} is empty", cluster);
        return None;
    }

    Some(rank(scored.as_mut_slice(), corpus.config().tier_candidates))
}

/// Fraction of query ingredients found in each recipe, over the whole corpus.
fn overlap_fallback(query: &Query, corpus: &Corpus) -> Option<Vec<Scored>> {
    let wanted = query.ingredients().len() as f64;
    let mut scored: Vec<(usize, f64)> = corpus
        .entries()
        .iter()
        .enumerate()
        .map(|(p, e)| {
            let hits = query
                .ingredients()
                .iter()
                .filter(|q| e.recipe.has_ingredient(q))
                .count();
            (p, hits as f64 / wanted)
        })
        .collect();

    Some(rank(scored.as_mut_slice(), corpus.config().tier_candidates))
}

/// Stable sort by score descending, then keep the first `limit`.
fn rank(scored: &mut [(usize, f64)], limit: usize) -> Vec<Scored> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .iter()
        .take(limit)
        .map(|&(p, score)| (p, Some(score)))
        .collect()
}
