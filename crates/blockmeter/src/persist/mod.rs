//! # Persistence queue
//!
//! The queue is how served block records travel from the request coordinator
//! to durable storage without the caller waiting. The coordinator enqueues a
//! job right after a successful fetch and returns; workers drain the channel
//! independently. The flow:
//! 1. Coordinator serves a freshly fetched record
//! 2. Record is wrapped in a `PersistJob` and sent over the flume channel
//! 3. A worker receives the job and upserts it into the block store
//! 4. Failed upserts retry per the job's backoff until attempts run out
//!
//! ## Delivery semantics
//!
//! At-least-once: the same logical record can be enqueued by concurrent
//! lookups or retried after a partial failure. That is safe because the
//! store upsert is a full-field overwrite per key, so the final row is
//! order-independent.

pub mod history;
pub mod worker;

pub use self::{
    history::JobHistory,
    worker::{
        PersistWorker,
        spawn_workers,
    },
};

use crate::types::BlockRecord;
use metrics::counter;
use std::{
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
    time::Duration,
};
use thiserror::Error;

/// Delay schedule between upsert retries: `base * 2^retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
}

impl Backoff {
    pub fn exponential(base: Duration) -> Self {
        Self { base }
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base * 2u32.saturating_pow(retry)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_secs(2))
    }
}

/// Retry policy applied to every job produced by a queue.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    /// Total upsert attempts before the job is dropped.
    pub attempts: u32,
    pub backoff: Backoff,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

/// One unit of write-behind work.
#[derive(Debug, Clone)]
pub struct PersistJob {
    pub id: u64,
    pub record: BlockRecord,
    pub attempts: u32,
    pub backoff: Backoff,
}

/// Receipt returned to the producer. The queue owns the job itself until a
/// worker picks it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: u64,
    pub block_number: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("persistence queue disconnected")]
    Disconnected,
}

/// `flume` receiver for persistence jobs. Cloned by each worker.
pub type PersistJobReceiver = flume::Receiver<PersistJob>;

/// Producer half of the persistence queue.
#[derive(Debug)]
pub struct PersistQueue {
    tx: flume::Sender<PersistJob>,
    options: JobOptions,
    next_id: AtomicU64,
}

impl PersistQueue {
    /// Creates the queue, returning the producer and the worker-side receiver.
    pub fn new(options: JobOptions) -> (Self, PersistJobReceiver) {
        let (tx, rx) = flume::unbounded();
        (
            Self {
                tx,
                options,
                next_id: AtomicU64::new(1),
            },
            rx,
        )
    }

    /// Enqueues `record` for durable storage.
    ///
    /// Fails only when every worker is gone and the channel is disconnected.
    pub fn enqueue(&self, record: BlockRecord) -> Result<JobHandle, EnqueueError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let block_number = record.block_number;
        let job = PersistJob {
            id,
            record,
            attempts: self.options.attempts,
            backoff: self.options.backoff,
        };

        self.tx.send(job).map_err(|_| EnqueueError::Disconnected)?;
        counter!("blockmeter_persist_jobs_enqueued_total").increment(1);
        Ok(JobHandle { id, block_number })
    }
}
