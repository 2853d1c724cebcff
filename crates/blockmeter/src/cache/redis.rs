//! # Redis-backed cache tier
//!
//! Primary tier so cached block records survive restarts and are shared
//! across replicas. `RedisClientBackend` wraps a `redis::Client` and obtains
//! a connection per command. Construct it with `RedisClientBackend::new`
//! or `RedisClientBackend::from_url("redis://...")`.
//!
//! ## Redis schema
//!
//! Entries are namespaced to avoid key collisions:
//! ```ignore
//! blocks:slot:{number} → JSON-encoded block record, expiring via SETEX
//! ```

use crate::{
    cache::{
        CacheTier,
        TierError,
    },
    types::BlockRecord,
};
use redis::Commands;
use std::{
    fmt::{
        self,
        Debug,
    },
    time::Duration,
};
use tracing::error;

/// Prefix used to group all cache keys.
const DEFAULT_NAMESPACE: &str = "blocks";
const SLOT_PREFIX: &str = "slot";

/// Abstraction over the backing Redis client.
pub trait RedisBackend: Debug + Send + Sync {
    /// Reads the string stored at `key`, returning `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError>;
    /// Writes `value` at `key` with a relative expiry in seconds.
    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), redis::RedisError>;
}

/// Real Redis backend that delegates commands to `redis::Client`.
pub struct RedisClientBackend {
    client: redis::Client,
}

impl Clone for RedisClientBackend {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl Debug for RedisClientBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisClientBackend")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl RedisClientBackend {
    /// Wraps an existing `redis::Client`, allowing callers to share clients.
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Constructs a new backend by opening a client from the connection URL.
    pub fn from_url(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        Ok(Self::new(client))
    }

    /// Executes `func` with a read/write connection obtained from the client.
    fn with_connection<F, T>(&self, func: F) -> Result<T, redis::RedisError>
    where
        F: FnOnce(&mut redis::Connection) -> Result<T, redis::RedisError>,
    {
        let mut connection = match self.client.get_connection() {
            Ok(connection) => connection,
            Err(err) => {
                error!(target = "cache", error = ?err, "redis backend connection error");
                return Err(err);
            }
        };

        match func(&mut connection) {
            Ok(result) => Ok(result),
            Err(err) => {
                error!(target = "cache", error = ?err, "redis backend command error");
                Err(err)
            }
        }
    }
}

impl RedisBackend for RedisClientBackend {
    fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        self.with_connection(|conn| conn.get(key))
    }

    fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), redis::RedisError> {
        self.with_connection(|conn| conn.set_ex(key, value, ttl_secs))
    }
}

impl From<redis::RedisError> for TierError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Primary cache tier on a Redis backend; expiry is delegated to `SETEX`.
#[derive(Debug)]
pub struct RedisTier<B: RedisBackend> {
    backend: B,
    namespace: String,
}

impl<B: RedisBackend> RedisTier<B> {
    /// Creates a tier that stores entries under the default `blocks` namespace.
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    /// Creates a tier that stores entries under a custom namespace prefix.
    pub fn with_namespace(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    // Derives the Redis key that holds the record for a block number.
    fn slot_key(&self, block_number: u64) -> String {
        format!("{}:{}:{}", self.namespace, SLOT_PREFIX, block_number)
    }
}

impl<B: RedisBackend> CacheTier for RedisTier<B> {
    fn get(&self, block_number: u64) -> Result<Option<BlockRecord>, TierError> {
        let key = self.slot_key(block_number);
        match self.backend.get(&key)? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    fn set(&self, record: &BlockRecord, ttl: Duration) -> Result<(), TierError> {
        let key = self.slot_key(record.block_number);
        let value = serde_json::to_string(record)?;
        // SETEX rejects a zero expiry.
        self.backend.set_ex(&key, &value, ttl.as_secs().max(1))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory stand-in for the Redis backend, recording TTLs as written.
    #[derive(Debug, Default)]
    struct FakeBackend {
        entries: Mutex<HashMap<String, (String, u64)>>,
    }

    impl RedisBackend for FakeBackend {
        fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
            Ok(self
                .entries
                .lock()
                .get(key)
                .map(|(value, _)| value.clone()))
        }

        fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), redis::RedisError> {
            self.entries
                .lock()
                .insert(key.to_string(), (value.to_string(), ttl_secs));
            Ok(())
        }
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
    fn round_trip_with_namespaced_key() {
        let tier = RedisTier::new(FakeBackend::default());
        let record = test_record(359399609);

        tier.set(&record, Duration::from_secs(600)).unwrap();

        {
            let entries = tier.backend.entries.lock();
            let (value, ttl) = entries.get("blocks:slot:359399609").unwrap();
            assert_eq!(*ttl, 600);
            assert!(value.contains("\"transactionCount\":1476"));
        }

        assert_eq!(tier.get(359399609).unwrap(), Some(record));
        assert_eq!(tier.get(1).unwrap(), None);
    }

    #[test]
    fn custom_namespace_prefixes_keys() {
        let tier = RedisTier::with_namespace(FakeBackend::default(), "test");
        tier.set(&test_record(5), Duration::from_secs(1)).unwrap();
        assert!(tier.backend.entries.lock().contains_key("test:slot:5"));
    }

    #[test]
    fn zero_ttl_is_clamped() {
        let tier = RedisTier::new(FakeBackend::default());
        tier.set(&test_record(5), Duration::ZERO).unwrap();
        let entries = tier.backend.entries.lock();
        assert_eq!(entries.get("blocks:slot:5").unwrap().1, 1);
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let tier = RedisTier::new(FakeBackend::default());
        tier.backend
            .entries
            .lock()
            .insert("blocks:slot:9".to_string(), ("not json".to_string(), 600));

        assert!(matches!(tier.get(9), Err(TierError::Codec(_))));
    }
}
