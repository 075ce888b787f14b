//! Fetch request and response types

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};

/// Request mode as reported by `Sec-Fetch-Mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
    Websocket,
}

impl RequestMode {
    /// Parse a `Sec-Fetch-Mode` header value
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(RequestMode::Navigate),
            "same-origin" => Some(RequestMode::SameOrigin),
            "no-cors" => Some(RequestMode::NoCors),
            "cors" => Some(RequestMode::Cors),
            "websocket" => Some(RequestMode::Websocket),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::NoCors => "no-cors",
            RequestMode::Cors => "cors",
            RequestMode::Websocket => "websocket",
        }
    }
}

/// Request destination as reported by `Sec-Fetch-Dest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// An HTML document
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
    Other,
}

impl RequestDestination {
    /// Parse a `Sec-Fetch-Dest` header value; unknown values map to `Other`
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => RequestDestination::Document,
            "script" => RequestDestination::Script,
            "style" => RequestDestination::Style,
            "image" => RequestDestination::Image,
            "font" => RequestDestination::Font,
            "manifest" => RequestDestination::Manifest,
            "empty" | "" => RequestDestination::Empty,
            _ => RequestDestination::Other,
        }
    }
}

/// An intercepted outgoing request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    /// Absolute URL
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub mode: RequestMode,
    pub destination: RequestDestination,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            mode: RequestMode::default(),
            destination: RequestDestination::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a request from raw parts, reading the fetch metadata headers
    pub fn from_parts(method: Method, url: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        let mode = headers
            .get("sec-fetch-mode")
            .and_then(|h| h.to_str().ok())
            .and_then(RequestMode::from_header)
            .unwrap_or_default();

        let destination = headers
            .get("sec-fetch-dest")
            .and_then(|h| h.to_str().ok())
            .map(RequestDestination::from_header)
            .unwrap_or_default();

        Self {
            method,
            url: url.into(),
            headers,
            body,
            mode,
            destination,
        }
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response returned by the network or synthesized from the cache
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A `text/plain` response with an accurate `content-length`
    pub fn text(status: StatusCode, body: &str) -> Self {
        let mut response = Self::new(status, body.to_string());
        response.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        response
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }
}
