//! Types shared across the lookup pipeline.

use serde::{
    Deserialize,
    Serialize,
};

/// Normalized per-block metadata served to callers, cached, and persisted.
///
/// A block's content is immutable once finalized, so every derivation of the
/// record for a given `block_number` carries identical field values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub block_number: u64,
    pub transaction_count: u64,
    pub blockhash: String,
    /// Estimated block production time as a unix timestamp; absent on blocks
    /// the ledger reports no `blockTime` for.
    pub timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_is_camel_case() {
        let record = BlockRecord {
            block_number: 359399609,
            transaction_count: 1476,
            blockhash: "7SnecFadW1NizZ7eysE94xQ5uXAdE32PiaXiaWhr2efb".to_string(),
            timestamp: Some(1754938644),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "blockNumber": 359399609u64,
                "transactionCount": 1476,
                "blockhash": "7SnecFadW1NizZ7eysE94xQ5uXAdE32PiaXiaWhr2efb",
                "timestamp": 1754938644i64,
            })
        );

        let roundtrip: BlockRecord = serde_json::from_value(value).unwrap();
        assert_eq!(roundtrip, record);
    }
}
