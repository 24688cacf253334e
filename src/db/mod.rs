pub mod models;
pub mod processed;
pub mod recipes;

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

/// Open a pool for `database_url`. A file-backed database and its parent
/// directory are created when missing.
pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let options = connect_options(database_url).await?;
    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Initialize database connection pool with custom configuration
pub async fn init_pool_with_config(config: &DatabaseConfig) -> Result<DbPool> {
    let options = connect_options(&config.url).await?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn connect_options(database_url: &str) -> Result<SqliteConnectOptions> {
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        let path = path.split('?').next().unwrap_or(path);
        if !path.contains(":memory:") {
            if let Some(parent) = Path::new(path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    Ok(SqliteConnectOptions::from_str(database_url)?.create_if_missing(true))
}

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool() {
        let pool = init_pool("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '_sqlx%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(tables, vec!["processed_recipes", "recipes"]);
    }

    #[tokio::test]
    async fn test_init_pool_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("ingreedy.db");
        let config = DatabaseConfig {
            url: format!("sqlite:{}", db_path.display()),
            max_connections: 2,
            min_connections: 1,
            connection_timeout_seconds: 5,
            idle_timeout_seconds: 60,
        };

        let pool = init_pool_with_config(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        assert!(db_path.exists());
    }
}
