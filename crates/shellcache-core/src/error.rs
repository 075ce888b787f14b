//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] shellcache_storage::StorageError),

    #[error("Network error: {0}")]
    Network(#[from] shellcache_proxy::NetworkError),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Invalid worker state: {0}")]
    InvalidState(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
