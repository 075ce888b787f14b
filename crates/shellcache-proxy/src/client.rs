//! Network client used by the worker

use async_trait::async_trait;
use http::HeaderMap;
use http::header::{self, HeaderName};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::NetworkError;
use crate::request::{FetchRequest, FetchResponse};

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// The fetch API the worker strategies call into
///
/// One call is one attempt; implementations do not retry.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError>;
}

/// HTTP network configuration
#[derive(Clone, Debug)]
pub struct HttpNetworkConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

impl Default for HttpNetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            skip_tls_verify: false,
        }
    }
}

/// reqwest-backed network
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Create a new HTTP network client
    pub fn new(config: HttpNetworkConfig) -> Result<Self, NetworkError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!("Created HTTP network client (timeout: {:?})", config.timeout);

        Ok(Self { client })
    }
}

/// Copy headers, dropping hop-by-hop ones
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetworkError> {
        debug!("Fetching {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(forwardable(&request.headers));

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout
            } else if e.is_connect() {
                NetworkError::Unreachable(e.to_string())
            } else if e.is_builder() {
                NetworkError::InvalidRequest(e.to_string())
            } else {
                NetworkError::Http(e)
            }
        })?;

        let status = response.status();
        let headers = forwardable(response.headers());
        let body = response.bytes().await?;

        debug!("Fetched {} {} -> {}", request.method, request.url, status);

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
