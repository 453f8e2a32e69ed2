//! In-memory fakes for the `Table` and `KvStore` traits, used by
//! pipeline-level tests that exercise a loader without a live
//! Postgres/Redis instance.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::{BlockChildren, Table};
use crate::domain::{
    Block, BlockCount, BlockCountIndex, BlockFailedTransaction, BlockInternalTransaction,
    BlockTime, BlockTransaction, BlockWebsocketIndex,
};
use crate::error::IndexerError;
use crate::kv::{KvStore, UNSEEDED};

fn is_zero_text(value: &str) -> bool {
    value.is_empty() || value == "0x0"
}

fn pick_text(existing: &str, incoming: &str) -> String {
    if is_zero_text(incoming) {
        existing.to_string()
    } else {
        incoming.to_string()
    }
}

fn pick_num<N: Copy + PartialEq + Default>(existing: N, incoming: N) -> N {
    if incoming == N::default() {
        existing
    } else {
        incoming
    }
}

/// Merges `incoming` onto `existing` the same way the relational sparse-UPSERT
/// does: a field only overwrites its prior value when it is non-zero for its
/// type, and a row with no prior state keeps whatever zero-valued fields
/// `incoming` already carries (mirroring the column `DEFAULT`).
fn merge_block(existing: Option<&Block>, incoming: &Block) -> Block {
    let Some(existing) = existing else {
        return incoming.clone();
    };

    Block {
        number: incoming.number,
        hash: pick_text(&existing.hash, &incoming.hash),
        parent_hash: pick_text(&existing.parent_hash, &incoming.parent_hash),
        peer_id: pick_text(&existing.peer_id, &incoming.peer_id),
        timestamp: pick_num(existing.timestamp, incoming.timestamp),
        merkle_root_hash: pick_text(&existing.merkle_root_hash, &incoming.merkle_root_hash),
        version: pick_text(&existing.version, &incoming.version),
        block_type: pick_text(&existing.block_type, &incoming.block_type),
        item_id: pick_text(&existing.item_id, &incoming.item_id),
        item_timestamp: pick_text(&existing.item_timestamp, &incoming.item_timestamp),
        signature: pick_text(&existing.signature, &incoming.signature),
        next_leader: pick_text(&existing.next_leader, &incoming.next_leader),
        transaction_count: pick_num(existing.transaction_count, incoming.transaction_count),
        transaction_fees: pick_text(&existing.transaction_fees, &incoming.transaction_fees),
        transaction_amount: pick_text(&existing.transaction_amount, &incoming.transaction_amount),
        internal_transaction_amount: pick_text(
            &existing.internal_transaction_amount,
            &incoming.internal_transaction_amount,
        ),
        internal_transaction_count: pick_num(
            existing.internal_transaction_count,
            incoming.internal_transaction_count,
        ),
        failed_transaction_count: pick_num(
            existing.failed_transaction_count,
            incoming.failed_transaction_count,
        ),
        block_time: pick_num(existing.block_time, incoming.block_time),
    }
}

#[derive(Default)]
struct FakeTableInner {
    blocks: HashMap<u32, Block>,
    transactions: Vec<BlockTransaction>,
    failed_transactions: Vec<BlockFailedTransaction>,
    internal_transactions: Vec<BlockInternalTransaction>,
    block_times: HashMap<u32, BlockTime>,
    block_counts: HashMap<String, BlockCount>,
    count_indices: std::collections::HashSet<u32>,
    websocket_indices: std::collections::HashSet<u32>,
}

/// An in-memory stand-in for the relational layer. Cloning shares the
/// underlying state, the same way cloning a `PgPool` shares one connection
/// pool, so a table instance can be handed to several loaders in a test.
#[derive(Clone, Default)]
pub struct FakeTable {
    inner: Arc<Mutex<FakeTableInner>>,
}

impl FakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, number: u32) -> Option<Block> {
        self.inner.lock().unwrap().blocks.get(&number).cloned()
    }

    pub fn block_count(&self, count_type: &str) -> Option<BlockCount> {
        self.inner
            .lock()
            .unwrap()
            .block_counts
            .get(count_type)
            .cloned()
    }

    pub fn websocket_index_count(&self) -> usize {
        self.inner.lock().unwrap().websocket_indices.len()
    }
}

impl Table for FakeTable {
    async fn upsert_block(&self, block: &Block) -> Result<(), IndexerError> {
        let mut inner = self.inner.lock().unwrap();
        let merged = merge_block(inner.blocks.get(&block.number), block);
        inner.blocks.insert(block.number, merged);
        Ok(())
    }

    async fn fetch_block_children(&self, number: u32) -> Result<BlockChildren, IndexerError> {
        let inner = self.inner.lock().unwrap();
        Ok(BlockChildren {
            transactions: inner
                .transactions
                .iter()
                .filter(|t| t.number == number)
                .cloned()
                .collect(),
            internal_transactions: inner
                .internal_transactions
                .iter()
                .filter(|t| t.number == number)
                .cloned()
                .collect(),
            failed_transactions: inner
                .failed_transactions
                .iter()
                .filter(|t| t.number == number)
                .cloned()
                .collect(),
            block_time: inner.block_times.get(&number).cloned(),
        })
    }

    async fn upsert_block_transaction(&self, row: &BlockTransaction) -> Result<(), IndexerError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .transactions
            .iter_mut()
            .find(|t| t.transaction_hash == row.transaction_hash)
        {
            Some(existing) => *existing = row.clone(),
            None => inner.transactions.push(row.clone()),
        }
        Ok(())
    }

    async fn upsert_block_failed_transaction(
        &self,
        row: &BlockFailedTransaction,
    ) -> Result<(), IndexerError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .failed_transactions
            .iter_mut()
            .find(|t| t.transaction_hash == row.transaction_hash)
        {
            Some(existing) => *existing = row.clone(),
            None => inner.failed_transactions.push(row.clone()),
        }
        Ok(())
    }

    async fn upsert_block_internal_transaction(
        &self,
        row: &BlockInternalTransaction,
    ) -> Result<(), IndexerError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .internal_transactions
            .iter_mut()
            .find(|t| t.transaction_hash == row.transaction_hash && t.log_index == row.log_index)
        {
            Some(existing) => *existing = row.clone(),
            None => inner.internal_transactions.push(row.clone()),
        }
        Ok(())
    }

    async fn upsert_block_time(&self, row: &BlockTime) -> Result<(), IndexerError> {
        self.inner.lock().unwrap().block_times.insert(row.number, row.clone());
        Ok(())
    }

    async fn upsert_block_count(&self, row: &BlockCount) -> Result<(), IndexerError> {
        self.inner
            .lock()
            .unwrap()
            .block_counts
            .insert(row.count_type.clone(), row.clone());
        Ok(())
    }

    async fn try_insert_block_count_index(
        &self,
        index: &BlockCountIndex,
    ) -> Result<bool, IndexerError> {
        Ok(self.inner.lock().unwrap().count_indices.insert(index.number))
    }

    async fn count_block_count_index(&self) -> Result<u64, IndexerError> {
        Ok(self.inner.lock().unwrap().count_indices.len() as u64)
    }

    async fn try_insert_block_websocket_index(
        &self,
        index: &BlockWebsocketIndex,
    ) -> Result<bool, IndexerError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .websocket_indices
            .insert(index.number))
    }

    async fn select_block(&self, number: u32) -> Result<Block, IndexerError> {
        self.block(number).ok_or(IndexerError::NotFound)
    }
}

#[derive(Default)]
struct FakeKvInner {
    counters: HashMap<String, i64>,
    published: Vec<String>,
}

/// An in-memory stand-in for the Redis-backed counter/pub-sub coordinator.
#[derive(Clone, Default)]
pub struct FakeKv {
    inner: Arc<Mutex<FakeKvInner>>,
}

impl FakeKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<String> {
        self.inner.lock().unwrap().published.clone()
    }
}

impl KvStore for FakeKv {
    async fn get_counter(&self, key: &str) -> Result<i64, IndexerError> {
        Ok(*self
            .inner
            .lock()
            .unwrap()
            .counters
            .get(key)
            .unwrap_or(&UNSEEDED))
    }

    async fn set_counter(&self, key: &str, value: i64) -> Result<(), IndexerError> {
        self.inner
            .lock()
            .unwrap()
            .counters
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn incr_counter(&self, key: &str) -> Result<i64, IndexerError> {
        let mut inner = self.inner.lock().unwrap();
        let value = inner.counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn publish(&self, payload: &str) {
        self.inner.lock().unwrap().published.push(payload.to_string());
    }
}
