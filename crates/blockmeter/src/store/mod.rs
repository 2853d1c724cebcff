//! Durable block storage for the write-behind path.

pub mod sled;

pub use self::sled::SledBlockStore;

use crate::types::BlockRecord;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Debug;
use thiserror::Error;

/// Durable row for one block, keyed by block number.
///
/// `created_at` is set on first insertion and survives upserts;
/// `updated_at` is refreshed on every application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub block_number: u64,
    pub transaction_count: u64,
    pub blockhash: String,
    pub timestamp: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error")]
    Db(#[from] std::io::Error),
    #[error("failed to encode stored block")]
    Codec(#[from] bincode::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Seam between persistence workers and the durable store.
pub trait BlockStore: Debug + Send + Sync {
    /// Creates or fully overwrites the row for `record.block_number`.
    ///
    /// Applying the same record any number of times is idempotent: the data
    /// fields converge to the record's values no matter how often or in what
    /// order duplicate applications land; only `updated_at` moves.
    fn upsert(&self, record: &BlockRecord) -> Result<StoredBlock, StoreError>;
}
