//! Shellcache Core
//!
//! This crate provides the offline request-caching worker: the interception
//! router, the caching strategies, size-bounded eviction and the lifecycle
//! handlers, all reachable through a single event dispatcher.

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pattern;
pub mod response;
pub mod router;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{EvictionEngine, EvictionOrder, EvictionReport};
pub use config::{PatternSpec, WorkerConfig, validate_pattern};
pub use error::CoreError;
pub use lifecycle::{CLEANUP_SYNC_TAG, LifecycleManager, WorkerHost, WorkerMessage};
pub use pattern::{Pattern, matches};
pub use router::{BypassReason, Intercept, InterceptionPolicy, Route, Router};
pub use strategy::{FetchOutcome, ResponseSource, Revalidation, StrategyEngine};
pub use worker::{EventOutcome, Worker, WorkerEvent, WorkerState, spawn_cleanup_task};
