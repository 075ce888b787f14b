//! Size-bounded eviction

use chrono::{DateTime, Utc};
use serde::Serialize;
use shellcache_storage::{CacheGeneration, CacheKey};
use tracing::{debug, info, warn};

use super::policy::EvictionOrder;
use crate::error::CoreError;

/// Outcome of one eviction run
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EvictionReport {
    pub generation: String,
    pub budget: u64,
    pub total_before: u64,
    pub total_after: u64,
    pub freed: u64,
    pub evicted: Vec<CacheKey>,
}

impl EvictionReport {
    /// True when the generation was already within budget
    pub fn is_noop(&self) -> bool {
        self.evicted.is_empty()
    }
}

/// Trims a cache generation down to a byte budget, oldest entries first
#[derive(Debug, Clone, Copy, Default)]
pub struct EvictionEngine {
    order: EvictionOrder,
}

impl EvictionEngine {
    pub fn new(order: EvictionOrder) -> Self {
        Self { order }
    }

    /// Run one eviction pass
    ///
    /// Entries are removed oldest-first until the recorded total is within
    /// `budget` or nothing is left. A concurrent write to a key being evicted
    /// may be lost; the last writer wins.
    pub async fn evict(
        &self,
        generation: &CacheGeneration,
        budget: u64,
    ) -> Result<EvictionReport, CoreError> {
        let scanned_at = Utc::now();

        let mut candidates: Vec<(CacheKey, u64, DateTime<Utc>)> = generation
            .list_entries()
            .await?
            .into_iter()
            .map(|info| {
                let accessed = match self.order {
                    EvictionOrder::StoredAt => info.stored_at,
                    EvictionOrder::Scan => scanned_at,
                };
                (info.key, info.size, accessed)
            })
            .collect();

        let total: u64 = candidates.iter().map(|(_, size, _)| size).sum();

        let mut report = EvictionReport {
            generation: generation.name().to_string(),
            budget,
            total_before: total,
            total_after: total,
            freed: 0,
            evicted: Vec::new(),
        };

        if total <= budget {
            debug!(
                "Cache {} within budget ({} of {} bytes)",
                generation.name(),
                total,
                budget
            );
            return Ok(report);
        }

        info!(
            "Cache {} size {} exceeds limit {}, freeing {} bytes",
            generation.name(),
            total,
            budget,
            total - budget
        );

        // Stable sort: ties keep enumeration order
        candidates.sort_by_key(|(_, _, accessed)| *accessed);

        for (key, size, _) in candidates {
            if report.total_after <= budget {
                break;
            }

            debug!("Evicting cache entry: {} ({} bytes)", key, size);

            if let Err(e) = generation.delete(&key).await {
                warn!("Failed to evict {}: {}", key, e);
                continue;
            }

            report.total_after -= size;
            report.freed += size;
            report.evicted.push(key);
        }

        metrics::counter!("shellcache_evicted_bytes_total").increment(report.freed);
        metrics::counter!("shellcache_evicted_entries_total")
            .increment(report.evicted.len() as u64);

        info!(
            "Evicted {} bytes ({} entries) from cache {}",
            report.freed,
            report.evicted.len(),
            generation.name()
        );

        Ok(report)
    }
}
