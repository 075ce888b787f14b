//! Request interception routing
//!
//! Decides per request whether the worker stays out of the way or which
//! caching strategy handles it.

use http::Method;
use shellcache_proxy::{FetchRequest, RequestDestination, RequestMode};
use tracing::debug;

use crate::error::CoreError;
use crate::pattern::{Pattern, first_match, matches};
use crate::strategy::{FetchOutcome, StrategyEngine};

/// URL pattern lists driving the router
#[derive(Debug, Clone, Default)]
pub struct InterceptionPolicy {
    /// Requests matching any of these are never intercepted
    pub never_intercept: Vec<Pattern>,
    /// Requests matching any of these use stale-while-revalidate
    pub stale_while_revalidate: Vec<Pattern>,
}

/// Why a request was left alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassReason {
    Navigation,
    Document,
    /// A websocket upgrade; never cached
    WebSocket,
    /// Matched a never-intercept pattern (its text)
    NeverIntercept(String),
    /// Not a GET and not a static asset
    Method(Method),
}

impl BypassReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::Navigation => "navigation",
            BypassReason::Document => "document",
            BypassReason::WebSocket => "websocket",
            BypassReason::NeverIntercept(_) => "pattern",
            BypassReason::Method(_) => "method",
        }
    }
}

/// Routing decision for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Bypass(BypassReason),
    StaleWhileRevalidate,
    NetworkFirst,
}

/// Result of intercepting a request
#[derive(Debug)]
pub enum Intercept {
    /// Not handled; the request goes to the network as if no worker existed
    Bypass(BypassReason),
    Handled(FetchOutcome),
}

/// Stateless router over an interception policy
#[derive(Debug, Clone, Default)]
pub struct Router {
    policy: InterceptionPolicy,
}

impl Router {
    pub fn new(policy: InterceptionPolicy) -> Self {
        Self { policy }
    }

    /// Decide how a request is handled without executing anything
    pub fn route(&self, request: &FetchRequest) -> Route {
        if request.is_navigation() {
            return Route::Bypass(BypassReason::Navigation);
        }

        if request.mode == RequestMode::Websocket {
            return Route::Bypass(BypassReason::WebSocket);
        }

        if request.destination == RequestDestination::Document {
            return Route::Bypass(BypassReason::Document);
        }

        if let Some(pattern) = first_match(&request.url, &self.policy.never_intercept) {
            return Route::Bypass(BypassReason::NeverIntercept(pattern.to_string()));
        }

        if matches(&request.url, &self.policy.stale_while_revalidate) {
            return Route::StaleWhileRevalidate;
        }

        if request.method == Method::GET {
            return Route::NetworkFirst;
        }

        Route::Bypass(BypassReason::Method(request.method.clone()))
    }

    /// Route a request and run the chosen strategy
    pub async fn intercept(
        &self,
        request: &FetchRequest,
        strategies: &StrategyEngine,
    ) -> Result<Intercept, CoreError> {
        match self.route(request) {
            Route::Bypass(reason) => {
                debug!("Bypassing {} {} ({:?})", request.method, request.url, reason);
                metrics::counter!("shellcache_bypass_total", "reason" => reason.as_str())
                    .increment(1);
                Ok(Intercept::Bypass(reason))
            }
            Route::StaleWhileRevalidate => Ok(Intercept::Handled(
                strategies.stale_while_revalidate(request).await?,
            )),
            Route::NetworkFirst => Ok(Intercept::Handled(strategies.network_first(request).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ResponseSource;
    use crate::testing::{CountingStorage, MockNetwork};
    use shellcache_storage::CacheGeneration;

    fn router() -> Router {
        Router::new(InterceptionPolicy {
            never_intercept: vec![
                Pattern::literal("/rest/v1/"),
                Pattern::literal("/auth/v1/"),
                Pattern::regex("^wss?://").unwrap(),
            ],
            stale_while_revalidate: vec![Pattern::regex(r"\.(js|css|png|svg)(\?.*)?$").unwrap()],
        })
    }

    #[test]
    fn test_navigation_and_documents_bypass() {
        let router = router();

        let nav = FetchRequest::get("https://app.example/budget").with_mode(RequestMode::Navigate);
        assert_eq!(router.route(&nav), Route::Bypass(BypassReason::Navigation));

        let doc = FetchRequest::get("https://app.example/frame.html")
            .with_destination(RequestDestination::Document);
        assert_eq!(router.route(&doc), Route::Bypass(BypassReason::Document));
    }

    #[test]
    fn test_websocket_mode_bypasses_before_patterns() {
        // Same URL shape as a static asset, but an upgrade request
        let router = router();
        let socket =
            FetchRequest::get("https://app.example/socket.js").with_mode(RequestMode::Websocket);
        assert_eq!(router.route(&socket), Route::Bypass(BypassReason::WebSocket));
        assert_eq!(BypassReason::WebSocket.as_str(), "websocket");
    }

    #[test]
    fn test_never_intercept_wins_over_static_assets() {
        let router = router();
        let request = FetchRequest::get("https://db.example/rest/v1/icons/logo.png");
        assert_eq!(
            router.route(&request),
            Route::Bypass(BypassReason::NeverIntercept("\"/rest/v1/\"".to_string()))
        );
    }

    #[test]
    fn test_static_assets_and_fallback() {
        let router = router();

        let asset = FetchRequest::get("https://app.example/assets/index-9c1d.js");
        assert_eq!(router.route(&asset), Route::StaleWhileRevalidate);

        let data = FetchRequest::get("https://app.example/data/categories.json");
        assert_eq!(router.route(&data), Route::NetworkFirst);

        let post = FetchRequest::new(Method::POST, "https://app.example/data/categories.json");
        assert_eq!(router.route(&post), Route::Bypass(BypassReason::Method(Method::POST)));
    }

    #[test]
    fn test_non_get_static_asset_goes_to_swr() {
        // Static-asset matching precedes the method check
        let router = router();
        let put = FetchRequest::new(Method::PUT, "https://app.example/upload/receipt.png");
        assert_eq!(router.route(&put), Route::StaleWhileRevalidate);
    }

    #[tokio::test]
    async fn test_bypass_never_touches_store() {
        let router = router();
        let network = MockNetwork::new();
        let storage = CountingStorage::new();
        let generation = CacheGeneration::bind(storage.clone(), "finance-shell-v1").unwrap();
        let strategies = StrategyEngine::new(generation, network.clone());

        for url in [
            "https://db.example/rest/v1/expenses?select=*",
            "https://db.example/auth/v1/token?grant_type=refresh_token",
            "wss://db.example/realtime/v1/websocket",
        ] {
            let outcome = router.intercept(&FetchRequest::get(url), &strategies).await.unwrap();
            assert!(matches!(outcome, Intercept::Bypass(BypassReason::NeverIntercept(_))));
        }

        assert_eq!(storage.calls(), 0);
        assert!(network.calls().is_empty());
    }

    #[tokio::test]
    async fn test_intercept_delegates_to_network_first() {
        let router = router();
        let network = MockNetwork::new();
        network.respond("https://app.example/data/rates.json", 200, "[]");
        let storage = CountingStorage::new();
        let generation = CacheGeneration::bind(storage.clone(), "finance-shell-v1").unwrap();
        let strategies = StrategyEngine::new(generation, network.clone());

        let outcome = router
            .intercept(&FetchRequest::get("https://app.example/data/rates.json"), &strategies)
            .await
            .unwrap();

        match outcome {
            Intercept::Handled(outcome) => assert_eq!(outcome.source, ResponseSource::Network),
            other => panic!("expected handled, got {:?}", other),
        }
        assert_eq!(storage.puts().len(), 1);
    }
}
