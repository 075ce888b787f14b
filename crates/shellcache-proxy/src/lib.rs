//! Shellcache Network Layer
//!
//! This crate provides the fetch primitives the offline worker calls into:
//! request/response types carrying browser fetch metadata, and the
//! `Network` trait with its reqwest-backed implementation.

pub mod client;
pub mod error;
pub mod request;

pub use client::{HttpNetwork, HttpNetworkConfig, Network};
pub use error::NetworkError;
pub use request::{FetchRequest, FetchResponse, RequestDestination, RequestMode};
