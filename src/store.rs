//! Snapshot acquisition for rebuilds (the database first, then a JSON file)
//! and persistence of rebuild output.

use crate::config::Settings;
use crate::db::{self, DbPool};
use crate::error::{Error, Result};
use crate::indexer::corpus::Corpus;
use crate::indexer::handle::CorpusHandle;
use crate::indexer::recipe::RawRecipe;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Database,
    Json,
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotSource::Database => f.write_str("database"),
            SnapshotSource::Json => f.write_str("json"),
        }
    }
}

/// Read a JSON array of raw recipe records.
///
/// Elements that are not objects are kept as empty records so they are
/// excluded, and counted, during ingestion.
pub async fn load_json_snapshot(path: impl AsRef<Path>) -> Result<Vec<RawRecipe>> {
    let path = path.as_ref();
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::DataUnavailable(format!(
                "recipe file {} not found",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let items = match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => items,
        _ => {
            return Err(Error::DataUnavailable(format!(
                "{} does not contain a list of recipes",
                path.display()
            )))
        }
    };
    if items.is_empty() {
        return Err(Error::DataUnavailable(format!(
            "{} contains no recipes",
            path.display()
        )));
    }

    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                warn!("Record #{} in {} is unreadable: {}", index, path.display(), e);
                RawRecipe::default()
            })
        })
        .collect::<Vec<RawRecipe>>();

    info!("Loaded {} recipes from {}", records.len(), path.display());
    Ok(records)
}

/// Export the processed records of `corpus` as pretty JSON.
pub async fn write_processed_json(path: impl AsRef<Path>, corpus: &Corpus) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let processed = corpus.processed();
    let body = serde_json::to_vec_pretty(&processed)?;
    tokio::fs::write(path, body).await?;

    info!("Exported {} processed recipes to {}", processed.len(), path.display());
    Ok(processed.len())
}

/// Records for a rebuild: every database row if there are any, otherwise
/// the JSON file. A database failure is logged and treated as empty.
pub async fn load_snapshot(
    pool: Option<&DbPool>,
    json_path: impl AsRef<Path>,
) -> Result<(Vec<RawRecipe>, SnapshotSource)> {
    if let Some(pool) = pool {
        match db::recipes::load_snapshot(pool).await {
            Ok(records) if !records.is_empty() => {
                info!("Loaded {} recipes from the database", records.len());
                return Ok((records, SnapshotSource::Database));
            }
            Ok(_) => info!("Database holds no recipes, trying JSON file"),
            Err(e) => warn!("Failed to load recipes from the database: {}", e.log_safe()),
        }
    }

    let records = load_json_snapshot(json_path).await?;
    Ok((records, SnapshotSource::Json))
}

#[derive(Debug, Clone, Serialize)]
pub struct RebuildSummary {
    pub generation: u64,
    pub recipes: usize,
    pub excluded: usize,
    pub source: SnapshotSource,
    pub processed_rows: u64,
    pub exported: Option<usize>,
}

/// Full batch rebuild: acquire a snapshot, fit a new corpus, persist its
/// processed rows (and the optional JSON export), then publish it.
///
/// The new corpus goes live only once persistence succeeded, so an `Err`
/// always means the previous corpus is still in service. `export` overrides
/// `settings.corpus.processed_json_path`.
pub async fn rebuild_corpus(
    pool: &DbPool,
    handle: &Arc<CorpusHandle>,
    settings: &Settings,
    export: Option<&Path>,
) -> Result<RebuildSummary> {
    let permit = handle.begin_rebuild()?;

    let (records, source) = load_snapshot(Some(pool), &settings.corpus.recipes_json_path).await?;
    info!("Rebuilding corpus from {} records ({})", records.len(), source);

    let config = settings.engine.clone();
    let fitted = tokio::task::spawn_blocking(move || Corpus::rebuild(records, &config))
        .await
        .map_err(|e| Error::Internal(format!("Rebuild task failed: {e}")))?;
    let corpus = fitted.map_err(|e| {
        warn!(
            "Rebuild failed, keeping generation {}: {}",
            handle.generation(),
            e.log_safe()
        );
        e
    })?;

    let export = export.or(settings.corpus.processed_json_path.as_deref());
    let exported = match export {
        Some(path) => Some(write_processed_json(path, &corpus).await?),
        None => None,
    };
    let processed_rows = db::processed::replace_processed(pool, &corpus.processed()).await?;

    let corpus = permit.publish(corpus);

    Ok(RebuildSummary {
        generation: corpus.generation(),
        recipes: corpus.len(),
        excluded: corpus.excluded(),
        source,
        processed_rows,
        exported,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorpusConfig, DatabaseConfig, EngineConfig, ServerConfig};
    use crate::db::{init_pool, run_migrations};
    use serde_json::json;

    async fn write_json(dir: &tempfile::TempDir, value: Value) -> std::path::PathBuf {
        let path = dir.path().join("recipes.json");
        tokio::fs::write(&path, value.to_string()).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_json_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            json!([
                {"title": "Pasta", "ingredients": ["1 pound pasta"]},
                42,
                {"title": "Eggs", "ingredients": ["4 eggs"], "servings": 2}
            ]),
        )
        .await;

        let records = load_json_snapshot(&path).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title.as_deref(), Some("Pasta"));
        assert!(records[1].ingredients.is_none());
        assert_eq!(records[2].servings.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_load_json_snapshot_unavailable() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_json_snapshot(dir.path().join("missing.json")).await;
        assert!(matches!(missing, Err(Error::DataUnavailable(_))));

        let path = write_json(&dir, json!([])).await;
        assert!(matches!(load_json_snapshot(&path).await, Err(Error::DataUnavailable(_))));

        let path = write_json(&dir, json!({"recipes": []})).await;
        assert!(matches!(load_json_snapshot(&path).await, Err(Error::DataUnavailable(_))));
    }

    #[tokio::test]
    async fn test_database_first_then_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, json!([{"title": "From file", "ingredients": ["salt"]}])).await;
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let (records, source) = load_snapshot(Some(&pool), &path).await.unwrap();
        assert_eq!(source, SnapshotSource::Json);
        assert_eq!(records[0].title.as_deref(), Some("From file"));

        let stored: RawRecipe =
            serde_json::from_value(json!({"title": "From db", "ingredients": ["pepper"]})).unwrap();
        db::recipes::insert_recipe(&pool, &stored).await.unwrap();

        let (records, source) = load_snapshot(Some(&pool), &path).await.unwrap();
        assert_eq!(source, SnapshotSource::Database);
        assert_eq!(records[0].title.as_deref(), Some("From db"));

        let err = load_snapshot(None, dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn test_write_processed_json() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<RawRecipe> = serde_json::from_value(json!([
            {"id": 1, "title": "Pasta", "ingredients": ["1 pound pasta", "2 cloves garlic"]},
            {"id": 2, "title": "Bread", "ingredients": ["3 cups flour", "1 clove garlic"]}
        ]))
        .unwrap();
        let corpus = Corpus::rebuild(records, &EngineConfig::default()).unwrap();

        let out = dir.path().join("processed").join("recipes.json");
        assert_eq!(write_processed_json(&out, &corpus).await.unwrap(), 2);

        let written: Vec<Value> =
            serde_json::from_str(&tokio::fs::read_to_string(&out).await.unwrap()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0]["recipe_id"], 1);
        assert_eq!(written[0]["ingredients_simple"], json!(["pasta", "cloves garlic"]));
    }

    fn settings(recipes_json_path: std::path::PathBuf) -> Settings {
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
                recipes_json_path,
                processed_json_path: None,
            },
            engine: EngineConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_failed_persistence_keeps_previous_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            &dir,
            json!([
                {"title": "Pasta", "ingredients": ["1 pound pasta", "2 cloves garlic"]},
                {"title": "Bread", "ingredients": ["3 cups flour", "1 clove garlic"]}
            ]),
        )
        .await;
        let handle = Arc::new(CorpusHandle::empty(EngineConfig::default()));

        // no migrations: the snapshot falls back to JSON, storing rows fails
        let bare = init_pool("sqlite::memory:").await.unwrap();
        let err = rebuild_corpus(&bare, &handle, &settings(path.clone()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(handle.generation(), 0);
        assert!(handle.snapshot().is_empty());
        assert!(!handle.is_rebuilding());

        // an export path below a regular file cannot be written
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let blocked = path.join("processed.json");
        let err = rebuild_corpus(&pool, &handle, &settings(path.clone()), Some(&blocked))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(handle.generation(), 0);
        assert_eq!(db::processed::count_processed(&pool).await.unwrap(), 0);

        let summary = rebuild_corpus(&pool, &handle, &settings(path), None).await.unwrap();
        assert_eq!(summary.generation, 1);
        assert_eq!(summary.processed_rows, 2);
        assert_eq!(handle.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_rebuild_rejected_while_another_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(&dir, json!([{"title": "Salt", "ingredients": ["salt"]}])).await;
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let handle = Arc::new(CorpusHandle::empty(EngineConfig::default()));

        let permit = handle.begin_rebuild().unwrap();
        let err = rebuild_corpus(&pool, &handle, &settings(path.clone()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RebuildInProgress));
        drop(permit);

        assert!(rebuild_corpus(&pool, &handle, &settings(path), None).await.is_ok());
    }
}
