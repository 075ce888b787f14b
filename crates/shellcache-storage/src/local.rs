//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{CacheStorage, validate_generation_name};
use crate::entry::{CacheEntry, CacheKey, EntryInfo, StoredResponse};
use crate::error::StorageError;

/// Upper bound on the metadata header of an entry file
const MAX_HEADER_LEN: u32 = 1024 * 1024;

/// Entry metadata stored at the head of each entry file
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: CacheKey,
    status: u16,
    headers: Vec<(String, String)>,
    size: u64,
    stored_at: DateTime<Utc>,
    body_len: u64,
}

/// Local disk storage backend
///
/// Layout: `<base_path>/generations/<name>/<first 2 chars>/<key digest>.entry`.
/// An entry file is a big-endian `u32` header length, the JSON metadata, then
/// the body. Every put writes a uniquely named temp file and renames it into
/// place, so readers see either the old entry or the new one.
pub struct LocalStorage {
    generations_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        let generations_path = base_path.join("generations");

        fs::create_dir_all(&generations_path).await?;

        info!("Initialized local cache storage at {:?}", base_path);

        Ok(Self { generations_path })
    }

    fn generation_path(&self, generation: &str) -> Result<PathBuf, StorageError> {
        validate_generation_name(generation)?;
        Ok(self.generations_path.join(generation))
    }

    fn entry_path(&self, generation: &str, key: &CacheKey) -> Result<PathBuf, StorageError> {
        let digest = key.digest();
        // Use first 2 characters for sharding
        Ok(self
            .generation_path(generation)?
            .join(&digest[..2])
            .join(format!("{}.entry", digest)))
    }

    fn encode(meta: &EntryMeta, body: &[u8]) -> Result<Vec<u8>, StorageError> {
        let header = serde_json::to_vec(meta)?;
        let header_len = u32::try_from(header.len())
            .ok()
            .filter(|len| *len <= MAX_HEADER_LEN)
            .ok_or_else(|| {
                StorageError::Corrupt(format!("header too large for {}", meta.key))
            })?;

        let mut data = Vec::with_capacity(4 + header.len() + body.len());
        data.extend_from_slice(&header_len.to_be_bytes());
        data.extend_from_slice(&header);
        data.extend_from_slice(body);
        Ok(data)
    }

    fn decode(data: &[u8]) -> Result<(EntryMeta, Bytes), StorageError> {
        let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
            return Err(StorageError::Corrupt("truncated header length".to_string()));
        };
        let header_len = u32::from_be_bytes(*len_bytes) as usize;
        if header_len > rest.len() {
            return Err(StorageError::Corrupt("truncated header".to_string()));
        }

        let (header, body) = rest.split_at(header_len);
        let meta: EntryMeta = serde_json::from_slice(header)?;
        if body.len() as u64 != meta.body_len {
            return Err(StorageError::Corrupt(format!(
                "body of {} is {} bytes, expected {}",
                meta.key,
                body.len(),
                meta.body_len
            )));
        }

        Ok((meta, Bytes::copy_from_slice(body)))
    }

    /// Read only the metadata header of an entry file
    async fn read_meta(path: &Path) -> Result<EntryMeta, StorageError> {
        let mut file = fs::File::open(path).await?;
        let header_len = file.read_u32().await?;
        if header_len > MAX_HEADER_LEN {
            return Err(StorageError::Corrupt(format!(
                "header length {} in {:?}",
                header_len, path
            )));
        }

        let mut header = vec![0u8; header_len as usize];
        file.read_exact(&mut header).await?;
        Ok(serde_json::from_slice(&header)?)
    }

    /// Write to a fresh temp file next to `path`, then rename it over `path`
    async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, data).await?;
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[async_trait]
impl CacheStorage for LocalStorage {
    async fn open(&self, generation: &str) -> Result<(), StorageError> {
        let path = self.generation_path(generation)?;
        fs::create_dir_all(&path).await?;
        Ok(())
    }

    async fn get(
        &self,
        generation: &str,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
        let path = self.entry_path(generation, key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let (meta, body) = match Self::decode(&data) {
            Ok(decoded) => decoded,
            Err(e @ (StorageError::Corrupt(_) | StorageError::Serialization(_))) => {
                warn!("Dropping unreadable cache entry {}: {}", key, e);
                Self::remove_if_exists(&path).await?;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(Some(CacheEntry {
            response: StoredResponse {
                status: meta.status,
                headers: meta.headers,
                body,
            },
            size: meta.size,
            stored_at: meta.stored_at,
        }))
    }

    async fn put(
        &self,
        generation: &str,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> Result<(), StorageError> {
        let path = self.entry_path(generation, key)?;
        debug!("Writing cache entry {} to {:?}", key, path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let meta = EntryMeta {
            key: key.clone(),
            status: entry.response.status,
            headers: entry.response.headers,
            size: entry.size,
            stored_at: entry.stored_at,
            body_len: entry.response.body.len() as u64,
        };

        let data = Self::encode(&meta, &entry.response.body)?;
        Self::write_atomic(&path, &data).await
    }

    async fn delete(&self, generation: &str, key: &CacheKey) -> Result<bool, StorageError> {
        let path = self.entry_path(generation, key)?;
        debug!("Deleting cache entry {} at {:?}", key, path);

        Self::remove_if_exists(&path).await
    }

    async fn list_entries(&self, generation: &str) -> Result<Vec<EntryInfo>, StorageError> {
        let path = self.generation_path(generation)?;

        let mut shards = match fs::read_dir(&path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut infos = Vec::new();
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }

            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let file_path = file.path();
                if file_path.extension().and_then(|e| e.to_str()) != Some("entry") {
                    continue;
                }

                match Self::read_meta(&file_path).await {
                    Ok(meta) => infos.push(EntryInfo {
                        key: meta.key,
                        size: meta.size,
                        stored_at: meta.stored_at,
                    }),
                    // Deleted since the directory was read
                    Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Skipping unreadable cache entry {:?}: {}", file_path, e),
                }
            }
        }

        infos.sort_by(|a, b| {
            a.stored_at
                .cmp(&b.stored_at)
                .then_with(|| a.key.url.cmp(&b.key.url))
        });
        Ok(infos)
    }

    async fn delete_generation(&self, generation: &str) -> Result<bool, StorageError> {
        let path = self.generation_path(generation)?;
        debug!("Deleting cache generation at {:?}", path);

        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list_generations(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = fs::read_dir(&self.generations_path).await?;
        let mut names = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}
