//! blockmeter answers "how many transactions, and what metadata, does ledger
//! block N have?"
//!
//! Lookups run through a fetch → cache → serve → async-persist pipeline: a
//! two-tier read-through cache shields the Solana RPC from repeated
//! lookups, and every served result is recorded durably by a write-behind
//! queue without making the caller wait for the write.

pub mod cache;
pub mod config;
pub mod persist;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;

pub use config::{
    App,
    Config,
};
pub use service::{
    BlockService,
    LookupError,
};
pub use types::BlockRecord;
