use crate::api::models::SearchResponse;
use crate::config::Settings;
use crate::db::{self, models::ImportReport, DbPool};
use crate::indexer::handle::CorpusHandle;
use crate::store::{self, RebuildSummary};
use crate::Result;
use reqwest::Client;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Search a running server by ingredients
pub async fn search(
    server_url: &str,
    ingredients: &[String],
    max_results: Option<usize>,
) -> Result<()> {
    let client = Client::new();
    let url = format!("{server_url}/api/recipes/search");

    let response = client
        .post(&url)
        .json(&json!({
            "ingredients": ingredients,
            "max_results": max_results,
        }))
        .send()
        .await?
        .error_for_status()?;

    let search_results: SearchResponse = response.json().await?;
    print_search_results(&search_results);

    Ok(())
}

/// Load a JSON snapshot and store its records, skipping duplicates
pub async fn import(pool: &DbPool, path: &Path) -> Result<ImportReport> {
    let records = store::load_json_snapshot(path).await?;
    db::recipes::insert_many(pool, &records).await
}

/// Offline rebuild: fit a corpus from the current snapshot and persist the
/// processed records
pub async fn rebuild(
    pool: &DbPool,
    settings: &Settings,
    export: Option<&Path>,
) -> Result<RebuildSummary> {
    let handle = Arc::new(CorpusHandle::empty(settings.engine.clone()));
    store::rebuild_corpus(pool, &handle, settings, export).await
}

fn print_search_results(results: &SearchResponse) {
    if results.results.is_empty() {
        println!("No recipes found");
        return;
    }

    println!(
        "\nFound {} recipes for [{}] ({}):\n",
        results.results.len(),
        results.ingredients.join(", "),
        results.search_method
    );
    println!("{:<6} {:<50} {:<8} {:<8}", "ID", "Title", "Tier", "Score");
    println!("{}", "-".repeat(75));

    for recipe in &results.results {
        let score = recipe
            .score
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<6} {:<50} {:<8} {:<8}",
            recipe.recipe_id,
            truncate(&recipe.title, 48),
            recipe.tier.as_str(),
            score
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusConfig, DatabaseConfig, EngineConfig, ServerConfig};
    use crate::db::{init_pool, run_migrations};
    use crate::store::SnapshotSource;

    fn settings(recipes_json_path: &Path) -> Settings {
        Settings {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 5,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                external_url: None,
                max_request_body_size: 1048576,
            },
            corpus: CorpusConfig {
                recipes_json_path: recipes_json_path.to_path_buf(),
                processed_json_path: None,
            },
            engine: EngineConfig::default(),
        }
    }

    const RECIPES: &str = r#"[
        {"title": "Pasta", "ingredients": ["1 pound pasta", "2 tbsp olive oil", "3 cloves garlic, minced"]},
        {"title": "Eggs", "ingredients": ["4 eggs", "2 tbsp milk", "1 tbsp butter"]},
        {"title": "Pasta", "ingredients": ["1 pound pasta", "2 tbsp olive oil", "3 cloves garlic, minced"]},
        {"title": "Nothing", "ingredients": []}
    ]"#;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Pasta", 10), "Pasta");
        assert_eq!(truncate("Spaghetti aglio e olio", 10), "Spaghet...");
        assert_eq!(truncate("Crème brûlée à la maison", 8), "Crème...");
    }

    #[tokio::test]
    async fn test_import_then_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("recipes.json");
        tokio::fs::write(&json_path, RECIPES).await.unwrap();

        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let report = import(&pool, &json_path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 3, duplicates: 1 });

        let export = dir.path().join("out").join("processed.json");
        let summary = rebuild(&pool, &settings(&json_path), Some(&export)).await.unwrap();
        assert_eq!(summary.source, SnapshotSource::Database);
        assert_eq!(summary.recipes, 2);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.processed_rows, 2);
        assert_eq!(summary.exported, Some(2));
        assert!(export.exists());
    }

    #[tokio::test]
    async fn test_rebuild_falls_back_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("recipes.json");
        tokio::fs::write(&json_path, RECIPES).await.unwrap();

        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let summary = rebuild(&pool, &settings(&json_path), None).await.unwrap();
        assert_eq!(summary.source, SnapshotSource::Json);
        // the JSON file still holds the duplicate, ingestion keeps both ids
        assert_eq!(summary.recipes, 3);
        assert_eq!(summary.exported, None);
    }
}
