//! Error types for the catalog engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Remote catalog unreachable or answered with an error status
    #[error("Failed to fetch catalog {catalog_id}: {message}")]
    Fetch { catalog_id: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cache read failed: {0}")]
    CacheRead(String),

    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed embedded detail blob. Never leaves the details module.
    #[error("Detail parse error: {0}")]
    DetailParse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
