//! Worker configuration
//!
//! These types are shared with the host binary, which embeds them in its
//! own configuration file. Defaults are the compiled-in policy for the
//! finance web client.

use serde::{Deserialize, Serialize};
use shellcache_storage::validate_generation_name;

use crate::cache::EvictionOrder;
use crate::error::CoreError;
use crate::pattern::Pattern;
use crate::router::InterceptionPolicy;

/// A pattern as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatternSpec {
    /// Substring match
    Literal(String),
    /// Regular expression match
    Regex(String),
}

impl PatternSpec {
    pub fn compile(&self) -> Result<Pattern, CoreError> {
        match self {
            PatternSpec::Literal(text) => Ok(Pattern::literal(text.clone())),
            PatternSpec::Regex(expr) => Pattern::regex(expr),
        }
    }
}

/// Validate a configured pattern
pub fn validate_pattern(spec: &PatternSpec) -> Result<(), CoreError> {
    match spec {
        PatternSpec::Literal(text) if text.is_empty() => Err(CoreError::InvalidPattern(
            "literal pattern cannot be empty (it would match every URL)".to_string(),
        )),
        PatternSpec::Literal(_) => Ok(()),
        PatternSpec::Regex(_) => spec.compile().map(|_| ()),
    }
}

/// Offline worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the current cache generation; bump it on every deployment
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
    /// Size budget for the current generation in bytes
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Access-order proxy used when evicting
    #[serde(default)]
    pub eviction_order: EvictionOrder,
    /// Interval between `cache-cleanup` triggers in seconds (0 disables)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// App shell assets seeded at install, relative to the scope
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,
    #[serde(default = "default_never_intercept")]
    pub never_intercept: Vec<PatternSpec>,
    #[serde(default = "default_stale_while_revalidate")]
    pub stale_while_revalidate: Vec<PatternSpec>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            max_size: default_max_size(),
            eviction_order: EvictionOrder::default(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            manifest: default_manifest(),
            never_intercept: default_never_intercept(),
            stale_while_revalidate: default_stale_while_revalidate(),
        }
    }
}

impl WorkerConfig {
    /// Check names and patterns before the worker is built
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_generation_name(&self.cache_name)
            .map_err(|e| CoreError::InvalidConfig(format!("cache_name: {}", e)))?;

        for spec in self.never_intercept.iter().chain(&self.stale_while_revalidate) {
            validate_pattern(spec)?;
        }

        if let Some(bad) = self.manifest.iter().find(|url| url.trim().is_empty()) {
            return Err(CoreError::InvalidConfig(format!(
                "manifest entry cannot be empty: {:?}",
                bad
            )));
        }

        Ok(())
    }

    /// Compile the pattern lists
    pub fn interception_policy(&self) -> Result<InterceptionPolicy, CoreError> {
        Ok(InterceptionPolicy {
            never_intercept: compile_all(&self.never_intercept)?,
            stale_while_revalidate: compile_all(&self.stale_while_revalidate)?,
        })
    }
}

fn compile_all(specs: &[PatternSpec]) -> Result<Vec<Pattern>, CoreError> {
    specs.iter().map(PatternSpec::compile).collect()
}

fn default_cache_name() -> String {
    "finance-shell-v1".to_string()
}

fn default_max_size() -> u64 {
    50 * 1024 * 1024 // 50 MB
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_never_intercept() -> Vec<PatternSpec> {
    vec![
        PatternSpec::Literal("/api/".to_string()),
        PatternSpec::Literal("/auth/v1/".to_string()),
        PatternSpec::Literal("/rest/v1/".to_string()),
        PatternSpec::Literal("/storage/v1/".to_string()),
        PatternSpec::Literal("/functions/v1/".to_string()),
        PatternSpec::Literal("/realtime/v1/".to_string()),
        PatternSpec::Regex("^wss?://".to_string()),
        PatternSpec::Regex(r"\.html?(\?.*)?$".to_string()),
    ]
}

fn default_stale_while_revalidate() -> Vec<PatternSpec> {
    vec![PatternSpec::Regex(
        r"\.(js|mjs|css|png|jpe?g|gif|svg|webp|ico|woff2?|ttf|eot)(\?.*)?$".to_string(),
    )]
}
