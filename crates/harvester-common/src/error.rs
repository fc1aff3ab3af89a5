//! Error types for Harvester

use thiserror::Error;

/// Result type alias for Harvester operations
pub type Result<T> = std::result::Result<T, HarvesterError>;

/// Main error type for Harvester
#[derive(Error, Debug)]
pub enum HarvesterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
