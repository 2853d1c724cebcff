//! Request coordinator for block lookups.
//!
//! Orchestrates the fetch → cache → serve → async-persist pipeline for a
//! single lookup. A cache hit returns immediately with no side effects. On a
//! miss, concurrent callers for the same block share one ledger fetch, and
//! the served record is written back to the cache and queued for durable
//! storage without blocking the response. Cache and queue failures degrade
//! those side paths; only ledger failures reach the caller.

mod flight;

use crate::{
    cache::BlockCache,
    persist::PersistQueue,
    types::BlockRecord,
};
use blockmeter_ledger_client::{
    Ledger,
    LedgerError,
};
use flight::FlightMap;
use futures::FutureExt;
use metrics::{
    counter,
    histogram,
};
use std::{
    sync::Arc,
    time::Instant,
};
use thiserror::Error;
use tracing::{
    trace,
    warn,
};

/// Lookup failures surfaced to the transport layer.
///
/// Cloneable so every caller joined on the same flight receives the outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("block {0} not found")]
    NotFound(u64),
    #[error("failed to fetch block {block_number}: {message}")]
    Ledger { block_number: u64, message: String },
}

/// Coordinates lookups over the ledger, the cache, and the persistence
/// queue. Cheap to clone; all clones share the same state.
#[derive(Debug)]
pub struct BlockService<L> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for BlockService<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct Inner<L> {
    ledger: L,
    cache: BlockCache,
    queue: PersistQueue,
    flights: FlightMap,
}

impl<L: Ledger> BlockService<L> {
    pub fn new(ledger: L, cache: BlockCache, queue: PersistQueue) -> Self {
        Self {
            inner: Arc::new(Inner {
                ledger,
                cache,
                queue,
                flights: FlightMap::default(),
            }),
        }
    }

    /// Looks up the metadata record for `block_number`.
    ///
    /// On a cache miss the block is fetched once no matter how many callers
    /// are waiting on it, then cached and queued for durable storage
    /// best-effort.
    pub async fn lookup_block(&self, block_number: u64) -> Result<BlockRecord, LookupError> {
        if let Some(record) = self.inner.cache.get(block_number).await {
            trace!(target = "service", block_number, "Serving block from cache");
            return Ok(record);
        }

        let (flight, created) = self.inner.flights.join_or_start(block_number, || {
            let inner = Arc::clone(&self.inner);
            async move {
                let result = inner.fetch_and_record(block_number).await;
                inner.flights.complete(block_number);
                result
            }
            .boxed()
        });

        if !created {
            counter!("blockmeter_lookups_coalesced_total").increment(1);
        }

        flight.await
    }
}

impl<L: Ledger> Inner<L> {
    async fn fetch_and_record(&self, block_number: u64) -> Result<BlockRecord, LookupError> {
        let started = Instant::now();
        let fetched = self.ledger.fetch_block(block_number).await;
        histogram!("blockmeter_ledger_fetch_duration_seconds").record(started.elapsed());

        let raw = match fetched {
            Ok(raw) => raw,
            Err(LedgerError::NotFound) => {
                counter!("blockmeter_lookups_not_found_total").increment(1);
                return Err(LookupError::NotFound(block_number));
            }
            Err(err) => {
                return Err(LookupError::Ledger {
                    block_number,
                    message: err.to_string(),
                });
            }
        };

        let record = BlockRecord {
            block_number,
            transaction_count: raw.transactions.len() as u64,
            blockhash: raw.blockhash,
            timestamp: raw.block_time,
        };

        self.cache.set(&record).await;

        match self.queue.enqueue(record.clone()) {
            Ok(handle) => {
                trace!(
                    target = "service",
                    job_id = handle.id,
                    block_number,
                    "Enqueued persistence job"
                );
            }
            Err(err) => {
                counter!("blockmeter_persist_enqueue_failures_total").increment(1);
                warn!(
                    target = "service",
                    block_number,
                    error = %err,
                    "Failed to enqueue persistence job, serving without write-behind"
                );
            }
        }

        Ok(record)
    }
}
