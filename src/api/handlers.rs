use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    api::models::*,
    config::{EngineConfig, Settings},
    db,
    indexer::{handle::CorpusHandle, recipe::Recipe, search::QueryEngine},
    store::{self, RebuildSummary},
    Error, Result,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub corpus: Arc<CorpusHandle>,
    pub settings: Settings,
}

/// Requested result count, defaulted and capped by the engine settings.
fn resolve_max_results(requested: Option<usize>, engine: &EngineConfig) -> Result<usize> {
    match requested {
        None => Ok(engine.default_max_results),
        Some(0) => Err(Error::Validation(
            "max_results must be at least 1".to_string(),
        )),
        Some(n) => Ok(n.min(engine.max_results_limit)),
    }
}

fn run_search(
    state: &AppState,
    ingredients: &[String],
    max_results: Option<usize>,
) -> Result<SearchResponse> {
    let max_results = resolve_max_results(max_results, &state.settings.engine)?;
    let corpus = state.corpus.snapshot();
    let outcome = QueryEngine::new(&corpus).search(ingredients, max_results)?;

    debug!(
        "Search {:?} answered by {:?} with {} results",
        outcome.ingredients,
        outcome.method,
        outcome.results.len()
    );
    Ok(SearchResponse::from(&outcome))
}

/// POST /api/recipes/search - Search recipes by ingredients
pub async fn search_recipes(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    debug!("Search request: {:?}", request);
    run_search(&state, &request.ingredients, request.max_results).map(Json)
}

/// GET /api/recipes?ingredients=a,b - Search recipes by ingredients
pub async fn search_recipes_by_query(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    debug!("Search query: {:?}", params);
    run_search(&state, &params.ingredient_list(), params.max_results).map(Json)
}

/// GET /api/recipes/:id - Get recipe details
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>> {
    debug!("Get recipe request: {}", id);

    let corpus = state.corpus.snapshot();
    if let Some(recipe) = QueryEngine::new(&corpus).recipe(id) {
        return Ok(Json(recipe.clone()));
    }

    // stored since the last rebuild, or excluded from the corpus
    let row = db::recipes::get_recipe(&state.pool, id).await?;
    let recipe = Recipe::from_raw(0, row.into_raw()).map_err(|e| {
        debug!("Stored recipe {} is not servable: {}", id, e);
        Error::NotFound(format!("Recipe {id} not found"))
    })?;

    Ok(Json(recipe))
}

/// GET /api/recipes/random - Get a random recipe
pub async fn random_recipe(State(state): State<AppState>) -> Result<Json<Recipe>> {
    let corpus = state.corpus.snapshot();
    let recipe = QueryEngine::new(&corpus)
        .random_recipe(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| Error::NotFound("No recipes loaded".to_string()))?;

    Ok(Json(recipe))
}

/// GET /api/recipes/:id/similar - Recipes related to a recipe
pub async fn similar_recipes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarResponse>> {
    let max_results = resolve_max_results(params.max_results, &state.settings.engine)?;
    let corpus = state.corpus.snapshot();
    let similar = QueryEngine::new(&corpus).similar_to(id, max_results)?;

    Ok(Json(SimilarResponse {
        recipe_id: id,
        results: similar.iter().map(SimilarRecipe::from).collect(),
    }))
}

/// GET /api/ingredients - All normalized ingredient names
pub async fn list_ingredients(State(state): State<AppState>) -> Result<Json<IngredientsResponse>> {
    let corpus = state.corpus.snapshot();
    let ingredients: Vec<String> = QueryEngine::new(&corpus)
        .ingredients()
        .into_iter()
        .map(str::to_string)
        .collect();

    Ok(Json(IngredientsResponse {
        count: ingredients.len(),
        ingredients,
    }))
}

/// GET /api/stats - Corpus and store statistics
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    debug!("Get stats request");

    let stats = QueryEngine::new(&state.corpus.snapshot()).stats();
    let stored_recipes = db::recipes::count_recipes(&state.pool).await?;
    let processed_recipes = db::processed::count_processed(&state.pool).await?;

    Ok(Json(StatsResponse {
        corpus: stats,
        stored_recipes,
        processed_recipes,
    }))
}

/// POST /api/admin/rebuild - Rebuild and publish the corpus
pub async fn rebuild_corpus(State(state): State<AppState>) -> Result<Json<RebuildSummary>> {
    info!("Rebuild requested over HTTP");
    let summary = store::rebuild_corpus(&state.pool, &state.corpus, &state.settings, None).await?;
    Ok(Json(summary))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

/// GET /ready - Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<ReadinessResponse>> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();
    let corpus_loaded = !state.corpus.snapshot().is_empty();

    Ok(Json(ReadinessResponse {
        ready: db_healthy && corpus_loaded,
        database: if db_healthy { "ok" } else { "error" }.to_string(),
        corpus: if corpus_loaded { "ok" } else { "empty" }.to_string(),
    }))
}
