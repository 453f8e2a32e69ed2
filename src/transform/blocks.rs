use crate::domain::{Block, BlockCount, BlockWebsocketIndex, RawBlock};

/// The three loader messages one raw block produces: an identity-only
/// `Block` skeleton (aggregates left at their hex zero value; the loader
/// fills those in separately), a count-loader message, and a
/// websocket-index message carrying the WS projection payload.
pub struct BlockTransformOutput {
    pub block: Block,
    pub count: BlockCount,
    pub websocket_index: BlockWebsocketIndex,
}

pub fn transform_block(raw: &RawBlock) -> BlockTransformOutput {
    let block = Block {
        number: raw.number,
        hash: raw.hash.clone(),
        parent_hash: raw.parent_hash.clone(),
        peer_id: raw.peer_id.clone(),
        timestamp: raw.timestamp,
        merkle_root_hash: raw.merkle_root_hash.clone(),
        version: raw.version.clone(),
        block_type: "block".to_string(),
        item_id: raw.item_id.clone(),
        item_timestamp: raw.item_timestamp.clone(),
        signature: raw.signature.clone(),
        next_leader: raw.next_leader.clone(),
        transaction_count: raw.transaction_count,
        transaction_fees: "0x0".to_string(),
        transaction_amount: "0x0".to_string(),
        internal_transaction_amount: "0x0".to_string(),
        internal_transaction_count: 0,
        failed_transaction_count: 0,
        block_time: 0,
    };

    let count = BlockCount {
        count_type: "block".to_string(),
        count: 0,
        number: raw.number,
    };

    let websocket_index = BlockWebsocketIndex {
        number: raw.number,
        hash: raw.hash.clone(),
        transaction_count: raw.transaction_count,
        timestamp: raw.timestamp,
    };

    BlockTransformOutput {
        block,
        count,
        websocket_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_only_fields_are_copied_verbatim() {
        let raw = RawBlock {
            number: 100,
            hash: "0xaa".to_string(),
            transaction_count: 0,
            timestamp: 1_700_000_000_000_000,
            ..Default::default()
        };

        let out = transform_block(&raw);

        assert_eq!(out.block.number, 100);
        assert_eq!(out.block.transaction_fees, "0x0");
        assert_eq!(out.block.transaction_amount, "0x0");
        assert_eq!(out.block.internal_transaction_count, 0);
        assert_eq!(out.block.failed_transaction_count, 0);
        assert_eq!(out.websocket_index.hash, "0xaa");
        assert_eq!(out.websocket_index.timestamp, 1_700_000_000_000_000);
    }
}
