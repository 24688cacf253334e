use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub external_url: Option<String>,
    pub max_request_body_size: usize,
}

/// Where raw recipe snapshots come from when the database is empty,
/// and where processed records are exported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub recipes_json_path: PathBuf,
    pub processed_json_path: Option<PathBuf>,
}

/// Tuning for the normalize -> vectorize -> cluster -> query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Vocabulary cap (most frequent terms kept).
    pub max_features: usize,
    /// Minimum number of recipes a term must occur in.
    pub min_df: usize,
    /// Largest n-gram size, 1 (unigrams) or 2 (unigrams + bigrams).
    pub ngram_max: usize,
    pub kmeans_clusters: usize,
    pub kmeans_seed: u64,
    pub kmeans_restarts: usize,
    pub kmeans_max_iter: usize,
    pub hierarchical_clusters: usize,
    /// How many recipes the similarity and overlap tiers hand back.
    pub tier_candidates: usize,
    pub default_max_results: usize,
    pub max_results_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            min_df: 2,
            ngram_max: 2,
            kmeans_clusters: 20,
            kmeans_seed: 42,
            kmeans_restarts: 10,
            kmeans_max_iter: 300,
            hierarchical_clusters: 50,
            tier_candidates: 5,
            default_max_results: 5,
            max_results_limit: 100,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_features == 0 {
            return Err(Error::Config("VOCAB_MAX_FEATURES must be non-zero".to_string()));
        }
        if self.min_df == 0 {
            return Err(Error::Config("VOCAB_MIN_DF must be at least 1".to_string()));
        }
        if !(1..=2).contains(&self.ngram_max) {
            return Err(Error::Config("VOCAB_NGRAM_MAX must be 1 or 2".to_string()));
        }
        if self.kmeans_clusters < 2 || self.hierarchical_clusters < 2 {
            return Err(Error::Config(
                "Cluster counts must be at least 2".to_string(),
            ));
        }
        if self.kmeans_restarts == 0 || self.kmeans_max_iter == 0 {
            return Err(Error::Config(
                "KMEANS_RESTARTS and KMEANS_MAX_ITER must be non-zero".to_string(),
            ));
        }
        if self.tier_candidates == 0 {
            return Err(Error::Config("TIER_CANDIDATES must be non-zero".to_string()));
        }
        if self.default_max_results == 0 || self.default_max_results > self.max_results_limit {
            return Err(Error::Config(
                "DEFAULT_MAX_RESULTS must be between 1 and MAX_RESULTS_LIMIT".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: &str) -> Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| Error::Config(format!("Invalid {name} value")))
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/ingreedy.db".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let external_url = std::env::var("EXTERNAL_URL").ok();

        let recipes_json_path = std::env::var("RECIPES_JSON_PATH")
            .unwrap_or_else(|_| "data/raw_data/recipes.json".to_string())
            .into();
        let processed_json_path = std::env::var("PROCESSED_JSON_PATH").ok().map(PathBuf::from);

        Ok(Settings {
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", "5")?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", "1")?,
                connection_timeout_seconds: env_or("DATABASE_CONNECTION_TIMEOUT", "30")?,
                idle_timeout_seconds: env_or("DATABASE_IDLE_TIMEOUT", "600")?,
            },
            server: ServerConfig {
                host,
                port: env_or("PORT", "8000")?,
                external_url,
                max_request_body_size: env_or("MAX_REQUEST_BODY_SIZE", "1048576")?,
            },
            corpus: CorpusConfig {
                recipes_json_path,
                processed_json_path,
            },
            engine: EngineConfig {
                max_features: env_or("VOCAB_MAX_FEATURES", "1000")?,
                min_df: env_or("VOCAB_MIN_DF", "2")?,
                ngram_max: env_or("VOCAB_NGRAM_MAX", "2")?,
                kmeans_clusters: env_or("KMEANS_CLUSTERS", "20")?,
                kmeans_seed: env_or("KMEANS_SEED", "42")?,
                kmeans_restarts: env_or("KMEANS_RESTARTS", "10")?,
                kmeans_max_iter: env_or("KMEANS_MAX_ITER", "300")?,
                hierarchical_clusters: env_or("HIERARCHICAL_CLUSTERS", "50")?,
                tier_candidates: env_or("TIER_CANDIDATES", "5")?,
                default_max_results: env_or("DEFAULT_MAX_RESULTS", "5")?,
                max_results_limit: env_or("MAX_RESULTS_LIMIT", "100")?,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("Port must be non-zero".to_string()));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(Error::Config(
                "DATABASE_MIN_CONNECTIONS exceeds DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }

        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> Settings {
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
                recipes_json_path: "/tmp/recipes.json".into(),
                processed_json_path: None,
            },
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = test_settings();
        assert!(settings.validate().is_ok());

        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_engine_validation() {
        let mut settings = test_settings();
        settings.engine.ngram_max = 3;
        assert!(settings.validate().is_err());

        let mut settings = test_settings();
        settings.engine.kmeans_clusters = 1;
        assert!(settings.validate().is_err());

        let mut settings = test_settings();
        settings.engine.default_max_results = 500;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_features, 1000);
        assert_eq!(engine.min_df, 2);
        assert_eq!(engine.kmeans_clusters, 20);
        assert_eq!(engine.hierarchical_clusters, 50);
        assert_eq!(engine.tier_candidates, 5);
    }
}
