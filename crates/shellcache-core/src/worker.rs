//! Event dispatcher
//!
//! A [`Worker`] owns the router, the strategies and the lifecycle handlers
//! for one cache generation and tracks where it is in its lifecycle. The
//! host turns its own triggers into [`WorkerEvent`]s and dispatches them.

use parking_lot::RwLock;
use serde::Serialize;
use shellcache_proxy::{FetchRequest, Network};
use shellcache_storage::{CacheGeneration, CacheStorage};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::cache::{EvictionEngine, EvictionReport};
use crate::config::WorkerConfig;
use crate::error::CoreError;
use crate::lifecycle::{CLEANUP_SYNC_TAG, LifecycleManager, WorkerHost};
use crate::router::{Intercept, Router};
use crate::strategy::{FetchOutcome, StrategyEngine};

/// Lifecycle state of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    /// Installed, waiting to be activated
    Waiting,
    Active,
    /// Install failed; the worker never takes control
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }
}

/// Events delivered by the host
#[derive(Debug)]
pub enum WorkerEvent {
    Install,
    Activate,
    Message(serde_json::Value),
    Fetch(FetchRequest),
    PeriodicSync { tag: String },
}

impl WorkerEvent {
    fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Message(_) => "message",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::PeriodicSync { .. } => "periodicsync",
        }
    }
}

/// What handling an event produced
#[derive(Debug)]
pub enum EventOutcome {
    /// A message was acted upon
    Completed,
    Installed,
    Activated { deleted: Vec<String> },
    Evicted(EvictionReport),
    /// Unrecognized message or sync tag
    Ignored,
    /// The worker did not handle the fetch; send it to the network as is
    PassThrough,
    Responded(FetchOutcome),
}

/// The offline caching worker
pub struct Worker {
    scope: Url,
    state: RwLock<WorkerState>,
    router: Router,
    strategies: StrategyEngine,
    lifecycle: LifecycleManager,
}

impl Worker {
    /// Build a worker for `scope` from validated configuration
    ///
    /// Manifest paths are resolved against `scope`. Nothing is written to
    /// the store until the install event.
    pub fn new(
        config: &WorkerConfig,
        scope: Url,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        host: Arc<dyn WorkerHost>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let manifest = config
            .manifest
            .iter()
            .map(|path| {
                scope
                    .join(path)
                    .map(|url| url.to_string())
                    .map_err(|e| CoreError::InvalidConfig(format!("manifest entry {}: {}", path, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let generation = CacheGeneration::bind(storage.clone(), &config.cache_name)?;
        let router = Router::new(config.interception_policy()?);
        let strategies = StrategyEngine::new(generation, network.clone());
        let lifecycle = LifecycleManager::new(
            storage,
            network,
            host,
            config.cache_name.clone(),
            manifest,
            config.max_size,
            EvictionEngine::new(config.eviction_order),
        );

        Ok(Self {
            scope,
            state: RwLock::new(WorkerState::Installing),
            router,
            strategies,
            lifecycle,
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    pub fn cache_name(&self) -> &str {
        self.lifecycle.cache_name()
    }

    pub fn generation(&self) -> &CacheGeneration {
        self.strategies.generation()
    }

    /// Handle one event
    ///
    /// The returned future covers all work of the event except a
    /// stale-while-revalidate refresh, which comes back inside
    /// [`EventOutcome::Responded`] for the caller to settle.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, CoreError> {
        debug!("Dispatching {} event in state {}", event.name(), self.state().as_str());

        match event {
            WorkerEvent::Install => self.install().await,
            WorkerEvent::Activate => self.activate().await,
            WorkerEvent::Message(payload) => {
                if self.lifecycle.message(&payload).await? {
                    Ok(EventOutcome::Completed)
                } else {
                    Ok(EventOutcome::Ignored)
                }
            }
            WorkerEvent::Fetch(request) => self.fetch(&request).await,
            WorkerEvent::PeriodicSync { tag } => {
                if self.state() != WorkerState::Active {
                    debug!("Ignoring periodic sync {} before activation", tag);
                    return Ok(EventOutcome::Ignored);
                }

                match self.lifecycle.periodic_sync(&tag).await? {
                    Some(report) => Ok(EventOutcome::Evicted(report)),
                    None => Ok(EventOutcome::Ignored),
                }
            }
        }
    }

    async fn install(&self) -> Result<EventOutcome, CoreError> {
        let state = self.state();
        if !matches!(state, WorkerState::Installing | WorkerState::Redundant) {
            return Err(CoreError::InvalidState(format!(
                "cannot install a worker that is {}",
                state.as_str()
            )));
        }

        self.set_state(WorkerState::Installing);

        match self.lifecycle.install().await {
            Ok(_) => {
                self.set_state(WorkerState::Waiting);
                Ok(EventOutcome::Installed)
            }
            Err(e) => {
                error!("Install of {} failed: {}", self.cache_name(), e);
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    async fn activate(&self) -> Result<EventOutcome, CoreError> {
        let state = self.state();
        if !matches!(state, WorkerState::Waiting | WorkerState::Active) {
            return Err(CoreError::InvalidState(format!(
                "cannot activate a worker that is {}",
                state.as_str()
            )));
        }

        let deleted = self.lifecycle.activate().await?;
        self.set_state(WorkerState::Active);
        Ok(EventOutcome::Activated { deleted })
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<EventOutcome, CoreError> {
        if self.state() != WorkerState::Active {
            return Ok(EventOutcome::PassThrough);
        }

        match self.router.intercept(request, &self.strategies).await? {
            Intercept::Bypass(_) => Ok(EventOutcome::PassThrough),
            Intercept::Handled(outcome) => Ok(EventOutcome::Responded(outcome)),
        }
    }

    fn set_state(&self, state: WorkerState) {
        let mut current = self.state.write();
        if *current != state {
            info!("Worker {} is now {}", self.cache_name(), state.as_str());
            *current = state;
        }
    }
}

/// Spawn a background task that fires the cleanup sync periodically
pub fn spawn_cleanup_task(worker: Arc<Worker>, every: Duration) -> tokio::task::JoinHandle<()> {
    use tokio::time::interval;

    info!(
        "Starting background cache cleanup task (interval: {} seconds)",
        every.as_secs()
    );

    tokio::spawn(async move {
        let mut ticker = interval(every);

        // The first tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            debug!("Running scheduled cache cleanup");

            let event = WorkerEvent::PeriodicSync {
                tag: CLEANUP_SYNC_TAG.to_string(),
            };

            match worker.dispatch(event).await {
                Ok(EventOutcome::Evicted(report)) if !report.is_noop() => {
                    info!(
                        "Scheduled cleanup: {} entries evicted, {} bytes freed",
                        report.evicted.len(),
                        report.freed
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Error during scheduled cache cleanup: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{MockNetwork, RecordingHost, sized_entry};
    use bytes::Bytes;
    use serde_json::json;
    use shellcache_proxy::RequestMode;
    use shellcache_storage::{CacheKey, MemoryStorage};

    const SCOPE: &str = "https://app.example/";

    fn config() -> WorkerConfig {
        WorkerConfig {
            cache_name: "finance-shell-v2".to_string(),
            max_size: 100,
            manifest: vec!["/".to_string(), "/manifest.json".to_string()],
            ..Default::default()
        }
    }

    fn worker(
        config: &WorkerConfig,
    ) -> (Worker, Arc<MemoryStorage>, Arc<MockNetwork>, Arc<RecordingHost>) {
        let storage = Arc::new(MemoryStorage::new());
        let network = MockNetwork::new();
        let host = RecordingHost::new();
        let worker = Worker::new(
            config,
            Url::parse(SCOPE).unwrap(),
            storage.clone(),
            network.clone(),
            host.clone(),
        )
        .unwrap();
        (worker, storage, network, host)
    }

    fn serve_shell(network: &MockNetwork) {
        network.respond("https://app.example/", 200, "<html>shell</html>");
        network.respond("https://app.example/manifest.json", 200, "{}");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let storage = Arc::new(MemoryStorage::new());
        let bad = WorkerConfig {
            cache_name: String::new(),
            ..config()
        };

        let result = Worker::new(
            &bad,
            Url::parse(SCOPE).unwrap(),
            storage,
            MockNetwork::new(),
            RecordingHost::new(),
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let (worker, storage, network, _) = worker(&config());
        serve_shell(&network);

        let request = FetchRequest::get("https://app.example/assets/app.js");
        let outcome = worker.dispatch(WorkerEvent::Fetch(request.clone())).await.unwrap();
        assert!(matches!(outcome, EventOutcome::PassThrough));

        worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Waiting);

        let outcome = worker.dispatch(WorkerEvent::Fetch(request)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::PassThrough));
        assert_eq!(storage.keys("finance-shell-v2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let (worker, _, network, host) = worker(&config());
        network.respond("https://app.example/", 200, "shell");

        let result = worker.dispatch(WorkerEvent::Install).await;
        assert!(matches!(result, Err(CoreError::Install(_))));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert_eq!(host.skip_waiting_calls(), 0);

        let result = worker.dispatch(WorkerEvent::Activate).await;
        assert!(matches!(result, Err(CoreError::InvalidState(_))));

        // A later install may still succeed
        network.respond("https://app.example/manifest.json", 200, "{}");
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert_eq!(worker.state(), WorkerState::Waiting);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (worker, storage, network, host) = worker(&config());
        serve_shell(&network);
        storage.open("finance-shell-v1").await.unwrap();

        worker.dispatch(WorkerEvent::Install).await.unwrap();
        assert_eq!(host.skip_waiting_calls(), 1);

        match worker.dispatch(WorkerEvent::Activate).await.unwrap() {
            EventOutcome::Activated { deleted } => {
                assert_eq!(deleted, vec!["finance-shell-v1".to_string()])
            }
            other => panic!("expected activated, got {:?}", other),
        }
        assert_eq!(worker.state(), WorkerState::Active);
        assert_eq!(host.claim_calls(), 1);

        // Navigations are never intercepted
        let nav = FetchRequest::get("https://app.example/budget/2026")
            .with_mode(RequestMode::Navigate);
        assert!(matches!(
            worker.dispatch(WorkerEvent::Fetch(nav)).await.unwrap(),
            EventOutcome::PassThrough
        ));

        network.fail("https://app.example/categories.json");
        let data = FetchRequest::get("https://app.example/categories.json");
        match worker.dispatch(WorkerEvent::Fetch(data)).await.unwrap() {
            EventOutcome::Responded(outcome) => {
                assert_eq!(outcome.source, ResponseSource::Offline)
            }
            other => panic!("expected response, got {:?}", other),
        }

        network.respond("https://app.example/assets/app.js", 200, "console.log(1)");
        let asset = FetchRequest::get("https://app.example/assets/app.js");
        match worker.dispatch(WorkerEvent::Fetch(asset)).await.unwrap() {
            EventOutcome::Responded(outcome) => {
                assert_eq!(outcome.source, ResponseSource::Network);
                assert_eq!(outcome.response.body, Bytes::from_static(b"console.log(1)"));
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_never_intercept_passes_through_when_active() {
        let (worker, _, network, _) = worker(&config());
        serve_shell(&network);
        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();

        let request = FetchRequest::get("https://db.example/rest/v1/expenses?select=*");
        let outcome = worker.dispatch(WorkerEvent::Fetch(request)).await.unwrap();
        assert!(matches!(outcome, EventOutcome::PassThrough));
        assert!(!network.calls().iter().any(|url| url.contains("/rest/v1/")));
    }

    #[tokio::test]
    async fn test_messages_and_periodic_sync() {
        let (worker, storage, network, host) = worker(&config());
        serve_shell(&network);

        let outcome = worker
            .dispatch(WorkerEvent::Message(json!({"action": "skip-waiting"})))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Completed));
        let outcome = worker
            .dispatch(WorkerEvent::Message(json!({"action": "refresh"})))
            .await
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Ignored));
        assert_eq!(host.skip_waiting_calls(), 1);

        // No eviction before activation
        let sync = || WorkerEvent::PeriodicSync {
            tag: CLEANUP_SYNC_TAG.to_string(),
        };
        assert!(matches!(worker.dispatch(sync()).await.unwrap(), EventOutcome::Ignored));

        worker.dispatch(WorkerEvent::Install).await.unwrap();
        worker.dispatch(WorkerEvent::Activate).await.unwrap();
        storage
            .put(
                "finance-shell-v2",
                &CacheKey::get("https://app.example/assets/big.js"),
                sized_entry("big", 200, 0),
            )
            .await
            .unwrap();

        match worker.dispatch(sync()).await.unwrap() {
            EventOutcome::Evicted(report) => assert!(report.total_after <= 100),
            other => panic!("expected eviction, got {:?}", other),
        }

        let other = WorkerEvent::PeriodicSync {
            tag: "content-refresh".to_string(),
        };
        assert!(matches!(worker.dispatch(other).await.unwrap(), EventOutcome::Ignored));
    }
}
