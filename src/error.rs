use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No recipe data available: {0}")]
    DataUnavailable(String),

    #[error("Vectorizer produced an empty vocabulary")]
    VocabularyEmpty,

    #[error("Malformed recipe record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("Query contains no searchable ingredients")]
    QueryOutOfDomain,

    #[error("A corpus rebuild is already running")]
    RebuildInProgress,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Get a sanitized error message safe for logging
    /// Filters out potentially sensitive information
    pub fn log_safe(&self) -> String {
        match self {
            // Database errors might contain sensitive schema information
            Error::Database(_) => "Database operation failed".to_string(),
            Error::Migration(_) => "Database migration failed".to_string(),

            // HTTP errors might contain internal URLs or authentication info
            Error::Http(_) => "External HTTP request failed".to_string(),

            Error::Internal(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("password")
                    || lower.contains("secret")
                    || lower.contains("token")
                    || lower.contains("key")
                {
                    "Internal error (details redacted)".to_string()
                } else {
                    format!("Internal error: {msg}")
                }
            }

            Error::Io(_) => "File system operation failed".to_string(),
            Error::Json(_) => "Malformed JSON data".to_string(),

            // These errors are generally safe to log as-is
            Error::DataUnavailable(_)
            | Error::VocabularyEmpty
            | Error::MalformedRecord { .. }
            | Error::QueryOutOfDomain
            | Error::RebuildInProgress
            | Error::Config(_)
            | Error::NotFound(_)
            | Error::Validation(_) => self.to_string(),
        }
    }
}

// Implement IntoResponse for API error handling
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        tracing::error!("Request error: {}", self.log_safe());

        let (status, error_message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::QueryOutOfDomain => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::DataUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "No recipe data available".to_string(),
            ),
            Error::RebuildInProgress => (StatusCode::CONFLICT, self.to_string()),
            Error::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            Error::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "External service error".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_safe_redacts_sensitive_internal_errors() {
        let err = Error::Internal("bad api key abc123".to_string());
        assert_eq!(err.log_safe(), "Internal error (details redacted)");

        let err = Error::Internal("fit diverged".to_string());
        assert_eq!(err.log_safe(), "Internal error: fit diverged");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::QueryOutOfDomain.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotFound("recipe 7".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::DataUnavailable("empty store".to_string())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::RebuildInProgress.into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
