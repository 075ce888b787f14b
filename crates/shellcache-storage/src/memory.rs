//! In-memory storage backend

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::backend::CacheStorage;
use crate::entry::{CacheEntry, CacheKey, EntryInfo};
use crate::error::StorageError;

#[derive(Default)]
struct GenerationMap {
    /// Entry plus the sequence number of its last write
    entries: HashMap<CacheKey, (u64, CacheEntry)>,
    next_seq: u64,
}

/// Process-local storage backend
///
/// Contents are lost when the process exits. Key enumeration follows write
/// order: overwriting a key moves it to the end.
#[derive(Default)]
pub struct MemoryStorage {
    generations: RwLock<BTreeMap<String, GenerationMap>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, generation: &str) -> Result<(), StorageError> {
        let mut generations = self.generations.write();
        if !generations.contains_key(generation) {
            debug!("Creating cache generation {}", generation);
            generations.insert(generation.to_string(), GenerationMap::default());
        }
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self
            .generations
            .read()
            .get(generation)
            .and_then(|map| map.entries.get(key))
            .map(|(_, entry)| entry.clone()))
    }

    async fn put(
        &self,
        generation: &str,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> Result<(), StorageError> {
        let mut generations = self.generations.write();
        let map = generations.entry(generation.to_string()).or_default();

        let seq = map.next_seq;
        map.next_seq += 1;
        map.entries.insert(key.clone(), (seq, entry));
        Ok(())
    }

    async fn delete(&self, generation: &str, key: &CacheKey) -> Result<bool, StorageError> {
        Ok(self
            .generations
            .write()
            .get_mut(generation)
            .and_then(|map| map.entries.remove(key))
            .is_some())
    }

    async fn list_entries(&self, generation: &str) -> Result<Vec<EntryInfo>, StorageError> {
        let generations = self.generations.read();
        let Some(map) = generations.get(generation) else {
            return Ok(Vec::new());
        };

        let mut listed: Vec<(u64, EntryInfo)> = map
            .entries
            .iter()
            .map(|(key, (seq, entry))| {
                let info = EntryInfo {
                    key: key.clone(),
                    size: entry.size,
                    stored_at: entry.stored_at,
                };
                (*seq, info)
            })
            .collect();
        listed.sort_by_key(|(seq, _)| *seq);

        Ok(listed.into_iter().map(|(_, info)| info).collect())
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, StorageError> {
        debug!("Deleting cache generation {}", generation);
        Ok(self.generations.write().remove(generation).is_some())
    }

    async fn list_generations(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.generations.read().keys().cloned().collect())
    }
}
