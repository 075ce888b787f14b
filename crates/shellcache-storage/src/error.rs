//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid generation name: {0}")]
    InvalidGeneration(String),

    #[error("Corrupt entry: {0}")]
    Corrupt(String),
}
