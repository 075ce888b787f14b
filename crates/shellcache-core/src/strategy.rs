//! Caching strategies
//!
//! Both strategies are stateless apart from the generation they write to and
//! make exactly one network attempt per call.

use http::StatusCode;
use http::header::{HeaderName, HeaderValue};
use shellcache_proxy::{FetchRequest, FetchResponse, Network, NetworkError};
use shellcache_storage::{CacheGeneration, CacheKey};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::response::{CACHE_STATUS_HEADER, cache_key, from_entry, is_cacheable, to_entry};

/// Body of the synthetic response served when nothing else is available
pub const OFFLINE_BODY: &str = "Offline - resource not available";

/// Where a strategy's response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Cached site root served for an uncached navigation
    RootShell,
    /// Synthetic 503
    Offline,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::RootShell => "root-shell",
            ResponseSource::Offline => "offline",
        }
    }
}

/// Background refresh started by stale-while-revalidate
///
/// The refresh runs to completion whether or not this handle is awaited;
/// awaiting it extends the event until the cache write has landed.
#[derive(Debug)]
pub struct Revalidation {
    key: CacheKey,
    handle: JoinHandle<Result<FetchResponse, NetworkError>>,
}

impl Revalidation {
    /// Wait for the refresh; failures are logged and swallowed
    pub async fn settle(self) {
        match self.handle.await {
            Ok(Ok(response)) => debug!("Revalidated {} ({})", self.key, response.status),
            Ok(Err(e)) => warn!("Background revalidation of {} failed: {}", self.key, e),
            Err(e) => warn!("Background revalidation of {} aborted: {}", self.key, e),
        }
    }
}

/// Result of a handled fetch
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: FetchResponse,
    pub source: ResponseSource,
    pub revalidation: Option<Revalidation>,
}

impl FetchOutcome {
    fn new(response: FetchResponse, source: ResponseSource) -> Self {
        Self {
            response,
            source,
            revalidation: None,
        }
    }

    /// Wait for any background work attached to this outcome
    pub async fn settle(&mut self) {
        if let Some(revalidation) = self.revalidation.take() {
            revalidation.settle().await;
        }
    }
}

/// Runs the caching strategies against the current generation
#[derive(Clone)]
pub struct StrategyEngine {
    generation: CacheGeneration,
    network: Arc<dyn Network>,
}

impl StrategyEngine {
    pub fn new(generation: CacheGeneration, network: Arc<dyn Network>) -> Self {
        Self {
            generation,
            network,
        }
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// Serve from cache when possible while refreshing from the network
    ///
    /// On a hit the cached response is returned immediately and the refresh
    /// is handed back as a [`Revalidation`]. On a miss the network result is
    /// awaited and returned, including its error.
    pub async fn stale_while_revalidate(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchOutcome, CoreError> {
        let key = cache_key(request);
        let cached = self.generation.get(&key).await?;
        let handle = self.spawn_refresh(request.clone(), key.clone());

        match cached {
            Some(entry) => {
                debug!("Cache hit for {}, revalidating in background", key);
                metrics::counter!("shellcache_cache_hits_total", "strategy" => "stale-while-revalidate")
                    .increment(1);

                Ok(FetchOutcome {
                    response: from_entry(entry, "hit"),
                    source: ResponseSource::Cache,
                    revalidation: Some(Revalidation { key, handle }),
                })
            }
            None => {
                debug!("Cache miss for {}, waiting for network", key);
                metrics::counter!("shellcache_cache_misses_total", "strategy" => "stale-while-revalidate")
                    .increment(1);

                let response = handle.await??;
                Ok(FetchOutcome::new(response, ResponseSource::Network))
            }
        }
    }

    fn spawn_refresh(
        &self,
        request: FetchRequest,
        key: CacheKey,
    ) -> JoinHandle<Result<FetchResponse, NetworkError>> {
        let generation = self.generation.clone();
        let network = self.network.clone();

        tokio::spawn(async move {
            let response = network.fetch(&request).await?;

            if is_cacheable(&request, &response)
                && let Err(e) = generation.put(&key, to_entry(&response)).await
            {
                warn!("Failed to cache refreshed {}: {}", key, e);
            }

            Ok(response)
        })
    }

    /// Prefer the network, falling back to the cache when it fails
    ///
    /// Fallback order: cached entry for the request, cached site root for
    /// navigations, then a synthetic 503.
    pub async fn network_first(&self, request: &FetchRequest) -> Result<FetchOutcome, CoreError> {
        let key = cache_key(request);

        let error = match self.network.fetch(request).await {
            Ok(response) => {
                if is_cacheable(request, &response)
                    && let Err(e) = self.generation.put(&key, to_entry(&response)).await
                {
                    warn!("Failed to cache {}: {}", key, e);
                }
                return Ok(FetchOutcome::new(response, ResponseSource::Network));
            }
            Err(e) => e,
        };

        warn!("Network request for {} failed, falling back to cache: {}", key, error);

        if let Some(entry) = self.generation.get(&key).await? {
            metrics::counter!("shellcache_cache_hits_total", "strategy" => "network-first")
                .increment(1);
            return Ok(FetchOutcome::new(from_entry(entry, "hit"), ResponseSource::Cache));
        }

        metrics::counter!("shellcache_cache_misses_total", "strategy" => "network-first")
            .increment(1);

        if request.is_navigation()
            && let Some(root) = root_key(&request.url)
            && let Some(entry) = self.generation.get(&root).await?
        {
            debug!("Serving cached site root for navigation to {}", request.url);
            return Ok(FetchOutcome::new(
                from_entry(entry, "root-shell"),
                ResponseSource::RootShell,
            ));
        }

        metrics::counter!("shellcache_offline_responses_total").increment(1);
        Ok(FetchOutcome::new(offline_response(), ResponseSource::Offline))
    }
}

/// Key of the site root (`/`) on the request's origin
fn root_key(url: &str) -> Option<CacheKey> {
    let root = url::Url::parse(url).ok()?.join("/").ok()?;
    Some(CacheKey::get(root.as_str()))
}

fn offline_response() -> FetchResponse {
    FetchResponse::text(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_BODY)
        .with_header(
            HeaderName::from_static(CACHE_STATUS_HEADER),
            HeaderValue::from_static("offline"),
        )
}
