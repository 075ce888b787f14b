//! Shellcache - offline app-shell caching proxy

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use shellcache_core::{EventOutcome, Worker, WorkerEvent, spawn_cleanup_task};
use shellcache_proxy::{HttpNetwork, HttpNetworkConfig, Network};
use shellcache_storage::{CacheStorage, LocalStorage, MemoryStorage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod error;
mod host;
mod routes;

use config::{Config, LoggingConfig, StorageBackend};
use host::LocalHost;
use routes::{AppState, create_router};

/// Shellcache - offline app-shell caching proxy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "SHELLCACHE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "SHELLCACHE_PORT")]
    port: Option<u16>,

    /// Upstream origin URL
    #[arg(short, long, env = "SHELLCACHE_UPSTREAM")]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(upstream) = args.upstream {
        config.upstream.url = upstream;
    }

    init_logging(&config.logging);

    info!("Starting Shellcache v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;
    let upstream = config.upstream_url()?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Initialize storage backend
    let storage: Arc<dyn CacheStorage> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory cache storage");
            Arc::new(MemoryStorage::new())
        }
        StorageBackend::Local => {
            info!("Using local cache storage at {}", config.storage.path);
            Arc::new(
                LocalStorage::new(&config.storage.path)
                    .await
                    .context("Failed to open local cache storage")?,
            )
        }
    };

    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(HttpNetworkConfig {
        timeout: Duration::from_secs(config.upstream.timeout_secs),
        skip_tls_verify: config.upstream.skip_tls_verify,
    })?);

    let host = Arc::new(LocalHost::new());
    let worker = Arc::new(Worker::new(
        &config.worker,
        upstream.clone(),
        storage,
        network.clone(),
        host.clone(),
    )?);

    start_worker(&worker).await;

    if config.worker.cleanup_interval_secs > 0 {
        spawn_cleanup_task(
            worker.clone(),
            Duration::from_secs(config.worker.cleanup_interval_secs),
        );
    }

    let state = AppState::new(worker, host, network, upstream.clone());
    let app = create_router(state, Some(metrics_handle)).layer(TraceLayer::new_for_http());

    // Determine bind address
    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);
    info!("Upstream: {}", upstream);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Install and activate the worker
///
/// A failed install leaves the worker redundant; the proxy keeps serving
/// every request straight from the network.
async fn start_worker(worker: &Worker) {
    if let Err(e) = worker.dispatch(WorkerEvent::Install).await {
        error!("Worker install failed, proxying without a cache: {}", e);
        return;
    }

    match worker.dispatch(WorkerEvent::Activate).await {
        Ok(EventOutcome::Activated { deleted }) if !deleted.is_empty() => {
            info!("Removed stale cache generations: {}", deleted.join(", "));
        }
        Ok(_) => {}
        Err(e) => warn!("Worker activation failed: {}", e),
    }
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
