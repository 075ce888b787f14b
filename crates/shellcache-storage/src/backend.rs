//! Storage backend trait

use async_trait::async_trait;

use crate::entry::{CacheEntry, CacheKey, EntryInfo};
use crate::error::StorageError;

/// Storage backend trait
///
/// Implementations hold any number of named cache generations, each a
/// key→entry map. The store never evicts on its own; every operation is
/// atomic per call and there are no cross-key transactions.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the generation if it does not exist yet
    async fn open(&self, generation: &str) -> Result<(), StorageError>;

    /// Read an entry
    async fn get(&self, generation: &str, key: &CacheKey)
        -> Result<Option<CacheEntry>, StorageError>;

    /// Write an entry, replacing any previous one for the same key
    async fn put(
        &self,
        generation: &str,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> Result<(), StorageError>;

    /// Delete an entry, returns whether it existed
    async fn delete(&self, generation: &str, key: &CacheKey) -> Result<bool, StorageError>;

    /// Key, size and write time of every entry, oldest write first
    ///
    /// Bodies are not read.
    async fn list_entries(&self, generation: &str) -> Result<Vec<EntryInfo>, StorageError>;

    /// All keys of a generation, oldest write first
    async fn keys(&self, generation: &str) -> Result<Vec<CacheKey>, StorageError> {
        Ok(self
            .list_entries(generation)
            .await?
            .into_iter()
            .map(|info| info.key)
            .collect())
    }

    /// Drop a whole generation, returns whether it existed
    async fn delete_generation(&self, generation: &str) -> Result<bool, StorageError>;

    /// Names of all known generations
    async fn list_generations(&self) -> Result<Vec<String>, StorageError>;
}

/// Check that a generation name is usable as a storage namespace
pub fn validate_generation_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.len() > 128 {
        return Err(StorageError::InvalidGeneration(format!(
            "name must be 1-128 characters: {:?}",
            name
        )));
    }

    if name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(StorageError::InvalidGeneration(name.to_string()));
    }

    Ok(())
}
