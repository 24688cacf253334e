pub mod config;
pub mod db;
pub mod error;

// Retrieval engine
pub mod indexer;

// Snapshot loading and rebuild persistence
pub mod store;

// Serving layer
pub mod api;

// Command-line interface
pub mod cli;

// Re-exports
pub use config::Settings;
pub use error::{Error, Result};
