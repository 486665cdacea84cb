use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::search::SearchError;

/// Main error type for the indexer
///
/// Only run-level failures live here. Item-level problems (a dropped
/// embedding, a rejected document) are recovered where they happen and
/// surface as counts, never as an `IndexerError`.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// A secret expected in the environment is missing
    #[error("Missing credentials: environment variable {var} is not set")]
    MissingCredentials { var: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Embedding service could not be set up
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The search cluster cannot be reached
    #[error("Search cluster unavailable at {host}: {source}")]
    ClusterUnavailable { host: String, source: SearchError },

    /// A required analysis plugin is not installed on the cluster
    #[error("Search cluster is missing plugin '{plugin}' required by the index analyzer")]
    MissingPlugin { plugin: String },

    /// Index could not be created, deleted or brought to a ready state
    #[error("Index '{index}' could not be prepared: {source}")]
    IndexCreation { index: String, source: SearchError },

    /// Generic search cluster errors
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;
