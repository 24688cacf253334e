use axum::http::{header, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::handlers::{self as api_handlers, AppState};
use crate::config::Settings;

/// Create the router with all endpoints
pub fn create_router(state: AppState, settings: &Settings) -> Router {
    let api_routes = Router::new()
        // Search
        .route("/recipes", get(api_handlers::search_recipes_by_query))
        .route("/recipes/search", post(api_handlers::search_recipes))
        // Recipes
        .route("/recipes/random", get(api_handlers::random_recipe))
        .route("/recipes/:id", get(api_handlers::get_recipe))
        .route("/recipes/:id/similar", get(api_handlers::similar_recipes))
        .route("/ingredients", get(api_handlers::list_ingredients))
        // Stats
        .route("/stats", get(api_handlers::get_stats))
        // Admin
        .route("/admin/rebuild", post(api_handlers::rebuild_corpus))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(api_handlers::health_check))
        .route("/ready", get(api_handlers::readiness_check))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            // Request body size limit - prevent memory exhaustion from large payloads
            RequestBodyLimitLayer::new(settings.server.max_request_body_size),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_origin(tower_http::cors::Any)
                .max_age(Duration::from_secs(3600)),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
