//! Shellcache Storage Layer
//!
//! This crate provides the versioned cache store used by the offline worker:
//! named cache generations holding request keys mapped to captured responses,
//! with in-memory and local disk backends.

pub mod backend;
pub mod entry;
pub mod error;
pub mod generation;
pub mod local;
pub mod memory;

pub use backend::{CacheStorage, validate_generation_name};
pub use entry::{CacheEntry, CacheKey, EntryInfo, StoredResponse};
pub use error::StorageError;
pub use generation::CacheGeneration;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
