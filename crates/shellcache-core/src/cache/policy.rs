//! Eviction ordering policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing eviction order
#[derive(Debug, Clone)]
pub struct ParseEvictionOrderError(String);

impl fmt::Display for ParseEvictionOrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid eviction order: {}", self.0)
    }
}

impl std::error::Error for ParseEvictionOrderError {}

/// Access-order proxy used to pick eviction victims
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionOrder {
    /// Oldest write first, using the timestamp captured at put time
    #[default]
    StoredAt,
    /// Every entry is stamped with the scan time, so victims are taken in
    /// key enumeration order
    Scan,
}

impl EvictionOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionOrder::StoredAt => "stored-at",
            EvictionOrder::Scan => "scan",
        }
    }
}

impl FromStr for EvictionOrder {
    type Err = ParseEvictionOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stored-at" | "stored_at" => Ok(EvictionOrder::StoredAt),
            "scan" => Ok(EvictionOrder::Scan),
            _ => Err(ParseEvictionOrderError(s.to_string())),
        }
    }
}
