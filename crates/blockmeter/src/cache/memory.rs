//! Bounded in-process cache tier.

use crate::{
    cache::{
        CacheTier,
        TierError,
    },
    types::BlockRecord,
};
use moka::sync::Cache;
use std::time::{
    Duration,
    Instant,
};

#[derive(Debug, Clone)]
struct MemoryEntry {
    record: BlockRecord,
    expires_at: Instant,
}

/// In-process fallback tier on a bounded `moka` cache.
///
/// Entries carry their own expiry deadline and are dropped on read once it
/// passes; capacity overflow evicts the least recently used entries.
pub struct MemoryTier {
    entries: Cache<u64, MemoryEntry>,
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("entry_count", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}

impl MemoryTier {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::new(max_entries),
        }
    }

    /// Forces deferred eviction bookkeeping, so capacity tests are deterministic.
    #[cfg(test)]
    fn flush_evictions(&self) {
        self.entries.run_pending_tasks();
    }
}

impl CacheTier for MemoryTier {
    fn get(&self, block_number: u64) -> Result<Option<BlockRecord>, TierError> {
        match self.entries.get(&block_number) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.record)),
            Some(_) => {
                self.entries.invalidate(&block_number);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, record: &BlockRecord, ttl: Duration) -> Result<(), TierError> {
        let entry = MemoryEntry {
            record: record.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(record.block_number, entry);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
