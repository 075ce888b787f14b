//! Cache eviction module

mod eviction;
mod policy;

pub use eviction::{EvictionEngine, EvictionReport};
pub use policy::EvictionOrder;
