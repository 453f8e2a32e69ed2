//! Entities of the data model plus the raw wire records the transformers
//! consume. Monetary amounts are `0x`-prefixed lowercase hex strings,
//! everything else is a plain scalar.

use serde::{Deserialize, Serialize};

/// One height's consolidated record. `number` is the sole primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: u32,
    pub hash: String,
    pub parent_hash: String,
    pub peer_id: String,
    pub timestamp: u64,
    pub merkle_root_hash: String,
    pub version: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub item_id: String,
    pub item_timestamp: String,
    pub signature: String,
    pub next_leader: String,
    pub transaction_count: u32,

    pub transaction_fees: String,
    pub transaction_amount: String,
    pub internal_transaction_amount: String,
    pub internal_transaction_count: u32,
    pub failed_transaction_count: u32,
    pub block_time: u64,
}

impl Block {
    /// A skeleton record with every aggregate field at its hex zero value
    /// (`"0x0"`/`0`), as produced by the blocks transformer; the loader fills
    /// in aggregates separately.
    pub fn skeleton(number: u32) -> Self {
        Self {
            number,
            transaction_fees: "0x0".to_string(),
            transaction_amount: "0x0".to_string(),
            internal_transaction_amount: "0x0".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockTransaction {
    pub transaction_hash: String,
    pub number: u32,
    pub fee: String,
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockFailedTransaction {
    pub transaction_hash: String,
    pub number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockInternalTransaction {
    pub transaction_hash: String,
    pub log_index: u32,
    pub number: u32,
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockTime {
    pub number: u32,
    pub time: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockCount {
    #[serde(rename = "type")]
    pub count_type: String,
    pub count: u64,
    pub number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockCountIndex {
    pub number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMissing {
    pub number: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockWebsocketIndex {
    pub number: u32,
    pub hash: String,
    pub transaction_count: u32,
    pub timestamp: u64,
}

/// The narrow view pushed to WS subscribers and the pub-sub channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockWsProjection {
    pub number: u32,
    pub hash: String,
    pub transaction_count: u32,
    pub timestamp: u64,
}

impl From<&BlockWebsocketIndex> for BlockWsProjection {
    fn from(idx: &BlockWebsocketIndex) -> Self {
        Self {
            number: idx.number,
            hash: idx.hash.clone(),
            transaction_count: idx.transaction_count,
            timestamp: idx.timestamp,
        }
    }
}

/// Strips any `0x` prefix and lowercases a hash for storage/query.
pub fn normalize_hash(hash: &str) -> String {
    hash.trim()
        .strip_prefix("0x")
        .unwrap_or(hash.trim())
        .to_ascii_lowercase()
}

/// Re-prefixes a stored hash for the API projection boundary.
pub fn display_hash(hash: &str) -> String {
    format!("0x{}", normalize_hash(hash))
}

// --- Raw records off the broker, already schema-decoded. ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub number: u32,
    pub hash: String,
    pub parent_hash: String,
    pub peer_id: String,
    pub timestamp: u64,
    pub merkle_root_hash: String,
    pub version: String,
    pub item_id: String,
    pub item_timestamp: String,
    pub signature: String,
    pub next_leader: String,
    pub transaction_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub block_number: u32,
    pub block_hash: String,
    pub hash: String,
    pub value: String,
    pub receipt_step_price: String,
    pub receipt_step_used: String,
    pub receipt_status: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub block_number: u32,
    pub transaction_hash: String,
    pub log_index: u32,
    /// JSON-encoded array, e.g. `["ICXTransfer(Address,Address,int)","0x1","0x2","0xde"]`.
    pub indexed: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_hash_strips_prefix_and_lowercases() {
        assert_eq!(normalize_hash("0xAABB"), "aabb");
        assert_eq!(normalize_hash("aabb"), "aabb");
    }

    #[test]
    fn display_hash_reprefixes() {
        assert_eq!(display_hash("aabb"), "0xaabb");
    }

    #[test]
    fn block_skeleton_has_zero_aggregates() {
        let block = Block::skeleton(100);
        assert_eq!(block.transaction_fees, "0x0");
        assert_eq!(block.transaction_amount, "0x0");
        assert_eq!(block.internal_transaction_count, 0);
    }
}
