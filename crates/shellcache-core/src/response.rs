//! Conversions between network responses and cache entries

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use shellcache_proxy::{FetchRequest, FetchResponse};
use shellcache_storage::{CacheEntry, CacheKey, StoredResponse};
use tracing::debug;

/// Header marking how a response was produced by the worker
pub const CACHE_STATUS_HEADER: &str = "x-shellcache";

/// Cache key for a request
pub fn cache_key(request: &FetchRequest) -> CacheKey {
    CacheKey::new(request.method.as_str(), &request.url)
}

/// Only successful GET responses are written to the cache
pub fn is_cacheable(request: &FetchRequest, response: &FetchResponse) -> bool {
    request.method == http::Method::GET && response.is_ok()
}

/// Capture a response for storage
pub fn to_entry(response: &FetchResponse) -> CacheEntry {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    CacheEntry::new(StoredResponse {
        status: response.status.as_u16(),
        headers,
        body: response.body.clone(),
    })
}

/// Rebuild a response from a cache entry, tagging it with `marker`
pub fn from_entry(entry: CacheEntry, marker: &'static str) -> FetchResponse {
    let mut headers = HeaderMap::with_capacity(entry.response.headers.len() + 1);

    for (name, value) in &entry.response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Dropping invalid cached header {}", name),
        }
    }

    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static(marker));

    FetchResponse {
        status: StatusCode::from_u16(entry.response.status).unwrap_or(StatusCode::OK),
        headers,
        body: entry.response.body,
    }
}
