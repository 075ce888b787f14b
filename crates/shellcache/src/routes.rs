//! Host HTTP surface
//!
//! Every request not addressed to `/__shellcache/*` or `/metrics` becomes a
//! fetch event against the upstream origin.

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use shellcache_core::{
    CLEANUP_SYNC_TAG, CoreError, EventOutcome, EvictionReport, Worker, WorkerEvent, WorkerState,
};
use shellcache_proxy::{FetchRequest, FetchResponse, Network};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::error::HostError;
use crate::host::LocalHost;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<Worker>,
    pub host: Arc<LocalHost>,
    pub network: Arc<dyn Network>,
    pub upstream: Url,
}

impl AppState {
    pub fn new(
        worker: Arc<Worker>,
        host: Arc<LocalHost>,
        network: Arc<dyn Network>,
        upstream: Url,
    ) -> Self {
        Self {
            worker,
            host,
            network,
            upstream,
        }
    }
}

/// Create the host router
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .route("/__shellcache/health", get(health))
        .route("/__shellcache/message", post(message))
        .route("/__shellcache/cleanup", post(cleanup))
        .fallback(proxy)
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(render_metrics))
                .with_state(handle),
        );
    }

    router
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub state: WorkerState,
    pub cache_name: String,
    pub scope: String,
    pub entries: usize,
    pub total_size: u64,
    pub waiting_skipped: bool,
    pub clients_claimed: bool,
}

/// GET /__shellcache/health
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, HostError> {
    let generation = state.worker.generation();
    let entries = generation.list_entries().await.map_err(CoreError::from)?;
    let total_size = entries.iter().map(|info| info.size).sum();

    let worker_state = state.worker.state();
    let status = match worker_state {
        WorkerState::Redundant => "degraded",
        _ => "healthy",
    };

    Ok(Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        state: worker_state,
        cache_name: state.worker.cache_name().to_string(),
        scope: state.worker.scope().to_string(),
        entries: entries.len(),
        total_size,
        waiting_skipped: state.host.waiting_skipped(),
        clients_claimed: state.host.clients_claimed(),
    }))
}

/// POST /__shellcache/message
async fn message(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, HostError> {
    let outcome = state.worker.dispatch(WorkerEvent::Message(payload)).await?;

    // A takeover request finishes a pending activation
    if matches!(outcome, EventOutcome::Completed) && state.worker.state() == WorkerState::Waiting {
        state.worker.dispatch(WorkerEvent::Activate).await?;
    }

    Ok(StatusCode::ACCEPTED)
}

/// POST /__shellcache/cleanup
async fn cleanup(State(state): State<AppState>) -> Result<Json<EvictionReport>, HostError> {
    let event = WorkerEvent::PeriodicSync {
        tag: CLEANUP_SYNC_TAG.to_string(),
    };

    match state.worker.dispatch(event).await? {
        EventOutcome::Evicted(report) => {
            info!(
                "On-demand cleanup: {} entries evicted, {} bytes freed",
                report.evicted.len(),
                report.freed
            );
            Ok(Json(report))
        }
        _ => Err(HostError::Conflict(format!(
            "worker is {}, cleanup runs only when active",
            state.worker.state().as_str()
        ))),
    }
}

/// GET /metrics
async fn render_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Fallback: run the request through the worker
async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HostError> {
    let url = upstream_url(&state.upstream, &uri);
    let request = FetchRequest::from_parts(method, url.as_str(), headers, body);

    match state.worker.dispatch(WorkerEvent::Fetch(request.clone())).await? {
        EventOutcome::Responded(mut outcome) => {
            debug!(
                "Served {} {} from {}",
                request.method,
                request.url,
                outcome.source.as_str()
            );

            // The refresh outlives the response
            if let Some(revalidation) = outcome.revalidation.take() {
                tokio::spawn(revalidation.settle());
            }

            Ok(to_response(outcome.response))
        }
        _ => {
            let response = state.network.fetch(&request).await?;
            Ok(to_response(response))
        }
    }
}

/// Map a proxied path onto the upstream origin
fn upstream_url(upstream: &Url, uri: &Uri) -> Url {
    let mut url = upstream.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

fn to_response(fetched: FetchResponse) -> Response {
    let mut response = Response::new(Body::from(fetched.body));
    *response.status_mut() = fetched.status;
    *response.headers_mut() = fetched.headers;
    response
}
