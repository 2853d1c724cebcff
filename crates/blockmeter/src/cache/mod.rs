//! Two-tier read-through cache for block records.
//!
//! The cache walks its tiers in priority order and serves the first live
//! entry it finds. A tier failure only disqualifies that tier for the
//! current operation, so cache infrastructure health can degrade the
//! feature (fewer tiers, or always-miss) but never fail a lookup.

pub mod memory;
pub mod redis;

pub use self::{
    memory::MemoryTier,
    redis::{
        RedisBackend,
        RedisClientBackend,
        RedisTier,
    },
};

use crate::types::BlockRecord;
use metrics::counter;
use std::{
    fmt::Debug,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tracing::{
    debug,
    warn,
};

/// A single cache backend queried by [`BlockCache`].
///
/// Tier I/O is synchronous; [`BlockCache`] moves calls onto the blocking
/// pool so lookups never stall the async runtime.
pub trait CacheTier: Debug + Send + Sync {
    /// Returns the live entry for `block_number`, or `None` on a miss.
    fn get(&self, block_number: u64) -> Result<Option<BlockRecord>, TierError>;
    /// Stores `record` with a relative expiry of `ttl`.
    fn set(&self, record: &BlockRecord, ttl: Duration) -> Result<(), TierError>;
    /// Identifies this tier in logs and metrics.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Error)]
pub enum TierError {
    #[error("cache backend request failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("cache entry codec error")]
    Codec(#[from] serde_json::Error),
    #[error("cache task failed: {0}")]
    Task(String),
}

/// Read-through cache over a startup-resolved set of tiers.
///
/// `get` returns the first live hit walking tiers in order; `set` writes
/// every reachable tier. Neither operation ever raises.
#[derive(Debug)]
pub struct BlockCache {
    tiers: Vec<Arc<dyn CacheTier>>,
    ttl: Duration,
}

impl BlockCache {
    /// Creates a cache over `tiers`, ordered by priority (index 0 first).
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>, ttl: Duration) -> Self {
        Self { tiers, ttl }
    }

    /// Returns the first live entry for `block_number`, or `None`.
    ///
    /// Tier errors are counted, logged, and treated as misses for that tier.
    pub async fn get(&self, block_number: u64) -> Option<BlockRecord> {
        for tier in &self.tiers {
            match Self::tier_get(tier, block_number).await {
                Ok(Some(record)) => {
                    counter!("blockmeter_cache_tier_hits_total", "tier" => tier.name())
                        .increment(1);
                    return Some(record);
                }
                Ok(None) => {
                    debug!(
                        target = "cache",
                        tier = tier.name(),
                        block_number,
                        "Cache tier miss"
                    );
                }
                Err(err) => {
                    counter!("blockmeter_cache_tier_errors_total", "tier" => tier.name())
                        .increment(1);
                    warn!(
                        target = "cache",
                        tier = tier.name(),
                        block_number,
                        error = ?err,
                        "Cache tier read failed"
                    );
                }
            }
        }

        counter!("blockmeter_cache_misses_total").increment(1);
        None
    }

    /// Writes `record` into every tier; an unreachable tier is skipped.
    pub async fn set(&self, record: &BlockRecord) {
        for tier in &self.tiers {
            if let Err(err) = Self::tier_set(tier, record.clone(), self.ttl).await {
                counter!("blockmeter_cache_tier_errors_total", "tier" => tier.name()).increment(1);
                warn!(
                    target = "cache",
                    tier = tier.name(),
                    block_number = record.block_number,
                    error = ?err,
                    "Cache tier write failed"
                );
            }
        }
    }

    async fn tier_get(
        tier: &Arc<dyn CacheTier>,
        block_number: u64,
    ) -> Result<Option<BlockRecord>, TierError> {
        let tier = Arc::clone(tier);
        tokio::task::spawn_blocking(move || tier.get(block_number))
            .await
            .map_err(|err| TierError::Task(err.to_string()))?
    }

    async fn tier_set(
        tier: &Arc<dyn CacheTier>,
        record: BlockRecord,
        ttl: Duration,
    ) -> Result<(), TierError> {
        let tier = Arc::clone(tier);
        tokio::task::spawn_blocking(move || tier.set(&record, ttl))
            .await
            .map_err(|err| TierError::Task(err.to_string()))?
    }
}
