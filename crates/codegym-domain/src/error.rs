//! Error types for exercise loading and configuration checks

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("exercise configuration invalid: {0}")]
    InvalidConfiguration(String),

    #[error("evaluation strategy not supported: {0}")]
    UnsupportedStrategy(String),
}

/// Result type for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
