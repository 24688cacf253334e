use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::indexer::cluster::{CentroidIndex, KMeansParams};
use crate::indexer::hierarchy::HierarchyIndex;
use crate::indexer::recipe::{RawRecipe, Recipe, RecipeId};
use crate::indexer::vectorizer::{SparseVector, Vectorizer, VectorizerParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A recipe together with everything the fit pipeline derived for it.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusEntry {
    pub recipe: Recipe,
    pub vector: SparseVector,
    pub centroid_cluster: usize,
    pub hierarchical_cluster: usize,
}

/// What gets persisted per recipe after a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecipe {
    pub recipe_id: RecipeId,
    pub title: String,
    pub ingredients_simple: Vec<String>,
    pub ingredients_text: String,
    pub cluster_kmeans: usize,
    pub cluster_hierarchical: usize,
}

/// Immutable, fully fitted search corpus. Vectors, vocabulary and both
/// partitions always come from the same recipe set; a new recipe set means a
/// new `Corpus`.
#[derive(Debug, Clone)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    positions: HashMap<RecipeId, usize>,
    vectorizer: Vectorizer,
    centroids: CentroidIndex,
    hierarchy: HierarchyIndex,
    config: EngineConfig,
    excluded: usize,
    generation: u64,
    built_at: DateTime<Utc>,
}

impl Corpus {
    /// Corpus with no recipes; searches against it return nothing.
    pub fn empty(config: EngineConfig) -> Self {
        Self {
            entries: Vec::new(),
            positions: HashMap::new(),
            vectorizer: Vectorizer::default(),
            centroids: CentroidIndex::default(),
            hierarchy: HierarchyIndex::default(),
            config,
            excluded: 0,
            generation: 0,
            built_at: Utc::now(),
        }
    }

    /// Normalize, vectorize and cluster a raw snapshot.
    ///
    /// Unusable records are skipped and counted. Fails with
    /// `Error::DataUnavailable` when nothing usable remains, and with
    /// `Error::VocabularyEmpty` when even the relaxed fit finds no terms.
    pub fn rebuild(snapshot: Vec<RawRecipe>, config: &EngineConfig) -> Result<Self> {
        if snapshot.is_empty() {
            return Err(Error::DataUnavailable(
                "snapshot contains no recipe records".to_string(),
            ));
        }

        let total = snapshot.len();
        let mut recipes: Vec<Recipe> = Vec::with_capacity(total);
        let mut positions = HashMap::with_capacity(total);
        let mut excluded = 0;

        for (index, raw) in snapshot.into_iter().enumerate() {
            match Recipe::from_raw(index, raw) {
                Ok(recipe) => {
                    if positions.contains_key(&recipe.id) {
                        warn!(
                            "Excluding record #{}: duplicate recipe id {}",
                            index, recipe.id
                        );
                        excluded += 1;
                        continue;
                    }
                    positions.insert(recipe.id, recipes.len());
                    recipes.push(recipe);
                }
                Err(e) => {
                    warn!("Excluding record: {}", e);
                    excluded += 1;
                }
            }
        }

        if recipes.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "all {total} records lacked usable ingredient data"
            )));
        }
        if excluded > 0 {
            info!("Filtered to {} valid recipes ({} excluded)", recipes.len(), excluded);
        }
        for recipe in recipes.iter().take(3) {
            debug!(
                "Sample recipe {}: {:?} -> {:?}",
                recipe.id,
                recipe.ingredients.iter().take(3).collect::<Vec<_>>(),
                recipe.ingredients_simple.iter().take(3).collect::<Vec<_>>()
            );
        }

        let documents: Vec<&str> = recipes.iter().map(|r| r.ingredients_text.as_str()).collect();
        let (vectorizer, vectors) = Vectorizer::fit_transform(
            &documents,
            &VectorizerParams {
                max_features: config.max_features,
                min_df: config.min_df,
                ngram_max: config.ngram_max,
            },
        )?;

        let centroids = CentroidIndex::fit(
            &vectors,
            &KMeansParams {
                clusters: config.kmeans_clusters,
                seed: config.kmeans_seed,
                restarts: config.kmeans_restarts,
                max_iter: config.kmeans_max_iter,
            },
        )?;
        let hierarchy = HierarchyIndex::fit(&vectors, config.hierarchical_clusters);

        let entries: Vec<CorpusEntry> = recipes
            .into_iter()
            .zip(vectors)
            .zip(centroids.labels().iter().zip(hierarchy.labels()))
            .map(|((recipe, vector), (&centroid_cluster, &hierarchical_cluster))| CorpusEntry {
                recipe,
                vector,
                centroid_cluster,
                hierarchical_cluster,
            })
            .collect();

        info!(
            "Built corpus: {} recipes, {} features, {} centroid clusters, {} hierarchical clusters",
            entries.len(),
            vectorizer.dim(),
            centroids.cluster_count(),
            hierarchy.cluster_count()
        );

        Ok(Self {
            entries,
            positions,
            vectorizer,
            centroids,
            hierarchy,
            config: config.clone(),
            excluded,
            generation: 0,
            built_at: Utc::now(),
        })
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, id: RecipeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn get(&self, id: RecipeId) -> Option<&CorpusEntry> {
        self.position(id).map(|i| &self.entries[i])
    }

    pub fn vectorizer(&self) -> &Vectorizer {
        &self.vectorizer
    }

    pub fn centroids(&self) -> &CentroidIndex {
        &self.centroids
    }

    pub fn hierarchy(&self) -> &HierarchyIndex {
        &self.hierarchy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Records skipped during the rebuild that produced this corpus.
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Move recipes between centroid clusters without refitting.
    #[cfg(test)]
    pub(crate) fn relabel_centroids(&mut self, labels: Vec<usize>) {
        for (entry, &label) in self.entries.iter_mut().zip(&labels) {
            entry.centroid_cluster = label;
        }
        self.centroids.relabel(labels);
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn processed(&self) -> Vec<ProcessedRecipe> {
        self.entries
            .iter()
            .map(|entry| ProcessedRecipe {
                recipe_id: entry.recipe.id,
                title: entry.recipe.title.clone(),
                ingredients_simple: entry.recipe.ingredients_simple.clone(),
                ingredients_text: entry.recipe.ingredients_text.clone(),
                cluster_kmeans: entry.centroid_cluster,
                cluster_hierarchical: entry.hierarchical_cluster,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(values: Vec<serde_json::Value>) -> Vec<RawRecipe> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    fn sample() -> Vec<RawRecipe> {
        snapshot(vec![
            json!({"title": "Pasta", "ingredients": ["1 pound pasta", "2 tbsp olive oil", "3 cloves garlic, minced"]}),
            json!({"title": "Eggs", "ingredients": ["4 eggs", "2 tbsp milk", "1 tbsp butter"]}),
            json!({"title": "Broken", "ingredients": "eggs"}),
            json!({"title": "Garlic bread", "ingredients": ["1 baguette", "4 cloves garlic", "3 tbsp butter", "2 tbsp olive oil"]}),
            json!({"title": "Omelette", "ingredients": ["3 eggs", "1 tbsp butter", "1/4 cup cheese"]}),
        ])
    }

    #[test]
    fn test_rebuild_excludes_malformed_records() {
        let corpus = Corpus::rebuild(sample(), &EngineConfig::default()).unwrap();

        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.excluded(), 1);
        assert!(corpus.position(3).is_none());
        assert_eq!(corpus.get(4).unwrap().recipe.title, "Garlic bread");
    }

    #[test]
    fn test_every_vector_matches_vocabulary() {
        let corpus = Corpus::rebuild(sample(), &EngineConfig::default()).unwrap();
        let dim = corpus.vectorizer().dim();

        assert!(dim > 0);
        for entry in corpus.entries() {
            assert_eq!(entry.vector.len(), dim);
        }
        assert_eq!(corpus.centroids().labels().len(), corpus.len());
        assert_eq!(corpus.hierarchy().labels().len(), corpus.len());
        // 4 recipes -> max(2, 4 / 2) clusters in both partitions
        assert_eq!(corpus.centroids().cluster_count(), 2);
        assert_eq!(corpus.hierarchy().cluster_count(), 2);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let a = Corpus::rebuild(sample(), &EngineConfig::default()).unwrap();
        let b = Corpus::rebuild(sample(), &EngineConfig::default()).unwrap();
        assert_eq!(a.centroids().labels(), b.centroids().labels());
        assert_eq!(a.hierarchy().labels(), b.hierarchy().labels());
        assert_eq!(a.processed(), b.processed());
    }

    #[test]
    fn test_rebuild_failures() {
        let err = Corpus::rebuild(Vec::new(), &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));

        let all_bad = snapshot(vec![json!({"title": "x"}), json!({"ingredients": ["2 cups"]})]);
        let err = Corpus::rebuild(all_bad, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }

    #[test]
    fn test_duplicate_ids_are_excluded() {
        let records = snapshot(vec![
            json!({"id": 7, "title": "First", "ingredients": ["salt"]}),
            json!({"id": 7, "title": "Second", "ingredients": ["pepper"]}),
        ]);
        let corpus = Corpus::rebuild(records, &EngineConfig::default()).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.excluded(), 1);
        assert_eq!(corpus.get(7).unwrap().recipe.title, "First");
    }

    #[test]
    fn test_processed_records() {
        let corpus = Corpus::rebuild(sample(), &EngineConfig::default()).unwrap();
        let processed = corpus.processed();
        assert_eq!(processed.len(), 4);
        assert_eq!(processed[0].recipe_id, 1);
        assert_eq!(processed[0].ingredients_simple, vec!["pasta", "olive oil", "cloves garlic"]);
        assert_eq!(processed[1].ingredients_text, "eggs milk butter");
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::empty(EngineConfig::default());
        assert!(corpus.is_empty());
        assert_eq!(corpus.vectorizer().dim(), 0);
        assert_eq!(corpus.generation(), 0);
    }
}
