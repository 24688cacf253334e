use crate::indexer::search::{CorpusStats, Recommendation, SearchOutcome, SearchResult, Tier};
use crate::indexer::recipe::RecipeId;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/recipes/search`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Query string of `GET /api/recipes`
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    /// Comma separated ingredient names
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchParams {
    pub fn ingredient_list(&self) -> Vec<String> {
        self.ingredients
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimilarParams {
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// One search hit as exchanged with clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResult {
    pub recipe_id: RecipeId,
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub score: Option<f64>,
    pub tier: Tier,
}

impl From<&SearchResult<'_>> for RecipeResult {
    fn from(result: &SearchResult<'_>) -> Self {
        Self {
            recipe_id: result.recipe.id,
            title: result.recipe.title.clone(),
            ingredients: result.recipe.ingredients.clone(),
            instructions: result.recipe.instructions.clone(),
            score: result.score,
            tier: result.tier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query ingredients after normalization
    pub ingredients: Vec<String>,
    pub results: Vec<RecipeResult>,
    pub method: Option<Tier>,
    pub search_method: String,
}

impl From<&SearchOutcome<'_>> for SearchResponse {
    fn from(outcome: &SearchOutcome<'_>) -> Self {
        Self {
            ingredients: outcome.ingredients.clone(),
            results: outcome.results.iter().map(RecipeResult::from).collect(),
            method: outcome.method,
            search_method: outcome
                .method
                .map(|tier| tier.label().to_string())
                .unwrap_or_else(|| "No matches found".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRecipe {
    pub recipe_id: RecipeId,
    pub title: String,
    pub score: f64,
}

impl From<&Recommendation<'_>> for SimilarRecipe {
    fn from(rec: &Recommendation<'_>) -> Self {
        Self {
            recipe_id: rec.recipe.id,
            title: rec.recipe.title.clone(),
            score: rec.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResponse {
    pub recipe_id: RecipeId,
    pub results: Vec<SimilarRecipe>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientsResponse {
    pub ingredients: Vec<String>,
    pub count: usize,
}

/// Corpus statistics plus store counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub corpus: CorpusStats,
    pub stored_recipes: i64,
    pub processed_recipes: i64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: String,
    pub corpus: String,
}
