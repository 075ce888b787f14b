//! Handle on a single cache generation

use std::fmt;
use std::sync::Arc;

use crate::backend::{CacheStorage, validate_generation_name};
use crate::entry::{CacheEntry, CacheKey, EntryInfo};
use crate::error::StorageError;

/// A named, opened cache generation
///
/// Cloning is cheap; all clones address the same generation in the same
/// backend.
#[derive(Clone)]
pub struct CacheGeneration {
    name: Arc<str>,
    storage: Arc<dyn CacheStorage>,
}

impl fmt::Debug for CacheGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheGeneration")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CacheGeneration {
    /// Open (creating if needed) a generation in the given backend
    pub async fn open(
        storage: Arc<dyn CacheStorage>,
        name: &str,
    ) -> Result<Self, StorageError> {
        validate_generation_name(name)?;
        storage.open(name).await?;

        Ok(Self {
            name: Arc::from(name),
            storage,
        })
    }

    /// Address a generation without creating it; the first write does
    pub fn bind(storage: Arc<dyn CacheStorage>, name: &str) -> Result<Self, StorageError> {
        validate_generation_name(name)?;

        Ok(Self {
            name: Arc::from(name),
            storage,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StorageError> {
        self.storage.get(&self.name, key).await
    }

    pub async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), StorageError> {
        self.storage.put(&self.name, key, entry).await
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool, StorageError> {
        self.storage.delete(&self.name, key).await
    }

    pub async fn keys(&self) -> Result<Vec<CacheKey>, StorageError> {
        self.storage.keys(&self.name).await
    }

    /// Size and write time of every entry, in key enumeration order
    pub async fn list_entries(&self) -> Result<Vec<EntryInfo>, StorageError> {
        self.storage.list_entries(&self.name).await
    }

    /// Sum of the recorded entry sizes
    pub async fn total_size(&self) -> Result<u64, StorageError> {
        Ok(self.list_entries().await?.iter().map(|info| info.size).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::StoredResponse;
    use crate::memory::MemoryStorage;
    use bytes::Bytes;

    fn entry(size: u64) -> CacheEntry {
        CacheEntry::new(StoredResponse {
            status: 200,
            headers: vec![("content-length".to_string(), size.to_string())],
            body: Bytes::from(vec![b'x'; size as usize]),
        })
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_name() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let result = CacheGeneration::open(storage, "../escape").await;
        assert!(matches!(result, Err(StorageError::InvalidGeneration(_))));
    }

    #[tokio::test]
    async fn test_total_size_and_listing() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let generation = CacheGeneration::open(storage.clone(), "cache-v1").await.unwrap();

        generation.put(&CacheKey::get("https://a/1"), entry(10)).await.unwrap();
        generation.put(&CacheKey::get("https://a/2"), entry(32)).await.unwrap();

        assert_eq!(generation.total_size().await.unwrap(), 42);
        let listed = generation.list_entries().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].key.url, "https://a/1");
        assert_eq!(listed[1].size, 32);

        assert_eq!(storage.list_generations().await.unwrap(), vec!["cache-v1"]);
    }
}
