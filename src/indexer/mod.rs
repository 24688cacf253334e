// Recipe retrieval engine: normalization, TF-IDF features, clustering and
// the tiered query engine

pub mod cluster;
pub mod corpus;
pub mod handle;
pub mod hierarchy;
pub mod normalizer;
pub mod recipe;
pub mod search;
pub mod vectorizer;

// Re-exports
pub use cluster::{effective_clusters, CentroidIndex, KMeansParams};
pub use corpus::{Corpus, CorpusEntry, ProcessedRecipe};
pub use handle::{CorpusHandle, RebuildPermit};
pub use hierarchy::HierarchyIndex;
pub use normalizer::{normalize, normalize_value};
pub use recipe::{RawRecipe, Recipe, RecipeId};
pub use search::{
    CorpusStats, Query, QueryEngine, Recommendation, SearchOutcome, SearchResult, Tier,
};
pub use vectorizer::{SparseVector, Vectorizer, VectorizerParams};
