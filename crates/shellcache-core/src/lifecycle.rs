//! Worker lifecycle handlers
//!
//! The host drives the lifecycle (installing → waiting → active →
//! redundant); this module supplies what runs at each transition.

use async_trait::async_trait;
use serde::Deserialize;
use shellcache_proxy::{FetchRequest, Network};
use shellcache_storage::{CacheGeneration, CacheKey, CacheStorage};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{EvictionEngine, EvictionReport};
use crate::error::CoreError;
use crate::response::to_entry;

/// Periodic sync tag that triggers eviction
pub const CLEANUP_SYNC_TAG: &str = "cache-cleanup";

/// Host-side controls invoked by the lifecycle handlers
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Activate the new worker without waiting for old clients to close
    async fn skip_waiting(&self);

    /// Take control of already-open clients without a reload
    async fn claim_clients(&self);
}

/// Messages understood by the worker
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum WorkerMessage {
    /// Take over immediately, e.g. after an update check
    #[serde(alias = "skip-waiting")]
    ForceActivate,
}

/// Install/activate/message/periodic-sync handlers for one cache generation
pub struct LifecycleManager {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    host: Arc<dyn WorkerHost>,
    cache_name: String,
    /// Absolute URLs of the shell assets
    manifest: Vec<String>,
    max_size: u64,
    eviction: EvictionEngine,
}

impl LifecycleManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        host: Arc<dyn WorkerHost>,
        cache_name: impl Into<String>,
        manifest: Vec<String>,
        max_size: u64,
        eviction: EvictionEngine,
    ) -> Self {
        Self {
            storage,
            network,
            host,
            cache_name: cache_name.into(),
            manifest,
            max_size,
            eviction,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Seed the current generation with the shell assets, then skip waiting
    ///
    /// All manifest URLs are fetched first; if any fails or is not a 200,
    /// nothing is written and the install fails.
    pub async fn install(&self) -> Result<CacheGeneration, CoreError> {
        info!(
            "Installing cache {} ({} shell assets)",
            self.cache_name,
            self.manifest.len()
        );

        let generation = CacheGeneration::open(self.storage.clone(), &self.cache_name).await?;

        let fetches = self.manifest.iter().map(|url| async move {
            let request = FetchRequest::get(url.as_str());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| CoreError::Install(format!("{}: {}", url, e)))?;

            if !response.is_ok() {
                return Err(CoreError::Install(format!(
                    "{} returned {}",
                    url, response.status
                )));
            }

            Ok((CacheKey::get(url), response))
        });

        let responses = futures::future::try_join_all(fetches).await?;

        for (key, response) in &responses {
            generation.put(key, to_entry(response)).await?;
        }

        info!(
            "Cached {} shell assets into {}",
            responses.len(),
            self.cache_name
        );

        self.host.skip_waiting().await;
        Ok(generation)
    }

    /// Delete every generation except the current one, then claim clients
    pub async fn activate(&self) -> Result<Vec<String>, CoreError> {
        let mut deleted = Vec::new();

        for name in self.storage.list_generations().await? {
            if name == self.cache_name {
                continue;
            }

            info!("Deleting stale cache generation {}", name);
            self.storage.delete_generation(&name).await?;
            deleted.push(name);
        }

        self.host.claim_clients().await;

        info!(
            "Activated cache {} ({} stale generations removed)",
            self.cache_name,
            deleted.len()
        );
        Ok(deleted)
    }

    /// Handle a client message; returns whether it was acted upon
    pub async fn message(&self, payload: &serde_json::Value) -> Result<bool, CoreError> {
        match WorkerMessage::deserialize(payload) {
            Ok(WorkerMessage::ForceActivate) => {
                info!("Received force-activate message, skipping waiting");
                self.host.skip_waiting().await;
                Ok(true)
            }
            Err(e) => {
                debug!("Ignoring unrecognized message {}: {}", payload, e);
                Ok(false)
            }
        }
    }

    /// Handle a periodic sync; only the cleanup tag does anything
    pub async fn periodic_sync(&self, tag: &str) -> Result<Option<EvictionReport>, CoreError> {
        if tag != CLEANUP_SYNC_TAG {
            debug!("Ignoring periodic sync with tag {}", tag);
            return Ok(None);
        }

        let generation = CacheGeneration::bind(self.storage.clone(), &self.cache_name)?;
        let report = self.eviction.evict(&generation, self.max_size).await?;
        Ok(Some(report))
    }
}
