//! `sled`-backed implementation of [`BlockStore`].

use crate::{
    store::{
        BlockStore,
        StoreError,
        StoredBlock,
    },
    types::BlockRecord,
};
use sled::{
    Config as DbConfig,
    Db,
};
use std::{
    path::Path,
    time::{
        SystemTime,
        UNIX_EPOCH,
    },
};

/// Durable block store on a local `sled` tree.
///
/// Rows are keyed by big-endian block number and bincode-encoded.
#[derive(Debug, Clone)]
pub struct SledBlockStore {
    db: Db,
}

impl SledBlockStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>, cache_capacity_bytes: usize) -> Result<Self, StoreError> {
        let db = DbConfig::new()
            .path(path)
            .cache_capacity_bytes(cache_capacity_bytes)
            .open()?;
        Ok(Self { db })
    }

    /// Reads the stored row for `block_number`.
    pub fn get(&self, block_number: u64) -> Result<Option<StoredBlock>, StoreError> {
        match self.db.get(block_number.to_be_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

impl BlockStore for SledBlockStore {
    fn upsert(&self, record: &BlockRecord) -> Result<StoredBlock, StoreError> {
        let key = record.block_number.to_be_bytes();
        let now = unix_now();

        let created_at = match self.db.get(key)? {
            Some(raw) => bincode::deserialize::<StoredBlock>(&raw)?.created_at,
            None => now,
        };

        let row = StoredBlock {
            block_number: record.block_number,
            transaction_count: record.transaction_count,
            blockhash: record.blockhash.clone(),
            timestamp: record.timestamp,
            created_at,
            updated_at: now,
        };

        self.db.insert(key, bincode::serialize(&row)?)?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_test_store() -> (TempDir, SledBlockStore) {
        let dir = TempDir::new().unwrap();
        let store = SledBlockStore::open(dir.path().join("db"), 1024 * 1024).unwrap();
        (dir, store)
    }

    fn test_record(block_number: u64) -> BlockRecord {
        BlockRecord {
            block_number,
            transaction_count: 1476,
            blockhash: "7SnecFadW1NizZ7eysE94xQ5uXAdE32PiaXiaWhr2efb".to_string(),
            timestamp: Some(1754938644),
        }
    }

    #[test]
    fn upsert_then_get() {
        let (_dir, store) = open_test_store();
        let record = test_record(359399609);

        let row = store.upsert(&record).unwrap();
        assert_eq!(row.block_number, record.block_number);
        assert_eq!(row.transaction_count, record.transaction_count);
        assert_eq!(row.blockhash, record.blockhash);
        assert_eq!(row.timestamp, record.timestamp);

        assert_eq!(store.get(359399609).unwrap(), Some(row));
        assert_eq!(store.get(1).unwrap(), None);
    }

    #[test]
    fn repeated_upsert_is_idempotent() {
        let (_dir, store) = open_test_store();
        let record = test_record(100);

        let first = store.upsert(&record).unwrap();
        let second = store.upsert(&record).unwrap();
        let third = store.upsert(&record).unwrap();

        for row in [&second, &third] {
            assert_eq!(row.transaction_count, first.transaction_count);
            assert_eq!(row.blockhash, first.blockhash);
            assert_eq!(row.timestamp, first.timestamp);
            assert_eq!(row.created_at, first.created_at);
        }
    }

    #[test]
    fn upsert_overwrites_all_data_fields() {
        let (_dir, store) = open_test_store();
        let mut record = test_record(100);
        store.upsert(&record).unwrap();

        record.transaction_count = 9;
        record.blockhash = "3JzqPkeFYQ4zRZcoBrzvfJDcRVYjh7Vy8Ni9sx5aVvmN".to_string();
        record.timestamp = None;
        store.upsert(&record).unwrap();

        let row = store.get(100).unwrap().unwrap();
        assert_eq!(row.transaction_count, 9);
        assert_eq!(row.blockhash, record.blockhash);
        assert_eq!(row.timestamp, None);
    }

    #[test]
    fn rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let record = test_record(55);

        {
            let store = SledBlockStore::open(&path, 1024 * 1024).unwrap();
            store.upsert(&record).unwrap();
        }

        let store = SledBlockStore::open(&path, 1024 * 1024).unwrap();
        let row = store.get(55).unwrap().unwrap();
        assert_eq!(row.blockhash, record.blockhash);
    }
}
