//! Cache keys and entries

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized request identity (method + URL without fragment)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    /// Build a key from a request method and URL
    pub fn new(method: &str, url: &str) -> Self {
        let url = match url.split_once('#') {
            Some((before, _)) => before,
            None => url,
        };

        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Key for a GET request
    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    /// Hex encoded SHA-256 of the key, used for on-disk names
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A captured HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StoredResponse {
    /// Look up a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared body size from `content-length`, 0 when absent or unparsable
    pub fn content_length(&self) -> u64 {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// A cached response with its bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub response: StoredResponse,
    /// Approximate size in bytes, taken from `content-length`
    pub size: u64,
    /// When the entry was written
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Wrap a response, stamping it with the current time
    pub fn new(response: StoredResponse) -> Self {
        let size = response.content_length();
        Self {
            response,
            size,
            stored_at: Utc::now(),
        }
    }
}

/// Bookkeeping of a stored entry, listed without reading its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: CacheKey,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(headers: &[(&str, &str)]) -> StoredResponse {
        StoredResponse {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Bytes::from_static(b"body"),
        }
    }

    #[test]
    fn test_key_strips_fragment_and_uppercases_method() {
        let key = CacheKey::new("get", "https://app.example/budget.js#v2");
        assert_eq!(key.method, "GET");
        assert_eq!(key.url, "https://app.example/budget.js");
        assert_eq!(key, CacheKey::get("https://app.example/budget.js"));
    }

    #[test]
    fn test_key_digest_distinguishes_method() {
        let get = CacheKey::new("GET", "https://app.example/a");
        let post = CacheKey::new("POST", "https://app.example/a");
        assert_ne!(get.digest(), post.digest());
        assert_eq!(get.digest().len(), 64);
    }

    #[test]
    fn test_entry_size_from_content_length() {
        let entry = CacheEntry::new(response(&[("Content-Length", "1234")]));
        assert_eq!(entry.size, 1234);

        let entry = CacheEntry::new(response(&[]));
        assert_eq!(entry.size, 0);

        let entry = CacheEntry::new(response(&[("content-length", "lots")]));
        assert_eq!(entry.size, 0);
    }
}
