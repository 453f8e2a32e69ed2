//! Relational access layer. One module per table's SQL, a shared pool,
//! idempotent migrations, and the sparse-UPSERT query builder that realizes
//! the "only write non-zero fields" rule shared by every loader.

mod pool;
mod sparse;
pub mod tables;

use sqlx::PgPool;

use crate::domain::{
    Block, BlockCount, BlockCountIndex, BlockFailedTransaction, BlockInternalTransaction,
    BlockTime, BlockTransaction, BlockWebsocketIndex,
};
use crate::error::IndexerError;

pub use pool::{connect, migrate_all};
pub use sparse::{sparse_upsert, SparseRow, SqlValue};
pub use tables::BlockChildren;

/// The relational operations a loader needs, abstracted over the concrete
/// pool so loaders can run against an in-memory fake in tests. `select_blocks`
/// and the other read-heavy HTTP-surface queries stay on the concrete
/// `tables` functions since only this trait's callers (the loaders) need to
/// be backend-agnostic.
pub trait Table: Clone + Send + Sync + 'static {
    async fn upsert_block(&self, block: &Block) -> Result<(), IndexerError>;
    async fn fetch_block_children(&self, number: u32) -> Result<BlockChildren, IndexerError>;
    async fn upsert_block_transaction(&self, row: &BlockTransaction) -> Result<(), IndexerError>;
    async fn upsert_block_failed_transaction(
        &self,
        row: &BlockFailedTransaction,
    ) -> Result<(), IndexerError>;
    async fn upsert_block_internal_transaction(
        &self,
        row: &BlockInternalTransaction,
    ) -> Result<(), IndexerError>;
    async fn upsert_block_time(&self, row: &BlockTime) -> Result<(), IndexerError>;
    async fn upsert_block_count(&self, row: &BlockCount) -> Result<(), IndexerError>;
    async fn try_insert_block_count_index(
        &self,
        index: &BlockCountIndex,
    ) -> Result<bool, IndexerError>;
    async fn count_block_count_index(&self) -> Result<u64, IndexerError>;
    async fn try_insert_block_websocket_index(
        &self,
        index: &BlockWebsocketIndex,
    ) -> Result<bool, IndexerError>;
    async fn select_block(&self, number: u32) -> Result<Block, IndexerError>;
}

impl Table for PgPool {
    async fn upsert_block(&self, block: &Block) -> Result<(), IndexerError> {
        tables::upsert_block(self, block).await
    }

    async fn fetch_block_children(&self, number: u32) -> Result<BlockChildren, IndexerError> {
        tables::fetch_block_children(self, number).await
    }

    async fn upsert_block_transaction(&self, row: &BlockTransaction) -> Result<(), IndexerError> {
        tables::upsert_block_transaction(self, row).await
    }

    async fn upsert_block_failed_transaction(
        &self,
        row: &BlockFailedTransaction,
    ) -> Result<(), IndexerError> {
        tables::upsert_block_failed_transaction(self, row).await
    }

    async fn upsert_block_internal_transaction(
        &self,
        row: &BlockInternalTransaction,
    ) -> Result<(), IndexerError> {
        tables::upsert_block_internal_transaction(self, row).await
    }

    async fn upsert_block_time(&self, row: &BlockTime) -> Result<(), IndexerError> {
        tables::upsert_block_time(self, row).await
    }

    async fn upsert_block_count(&self, row: &BlockCount) -> Result<(), IndexerError> {
        tables::upsert_block_count(self, row).await
    }

    async fn try_insert_block_count_index(
        &self,
        index: &BlockCountIndex,
    ) -> Result<bool, IndexerError> {
        tables::try_insert_block_count_index(self, index).await
    }

    async fn count_block_count_index(&self) -> Result<u64, IndexerError> {
        tables::count_block_count_index(self).await
    }

    async fn try_insert_block_websocket_index(
        &self,
        index: &BlockWebsocketIndex,
    ) -> Result<bool, IndexerError> {
        tables::try_insert_block_websocket_index(self, index).await
    }

    async fn select_block(&self, number: u32) -> Result<Block, IndexerError> {
        tables::select_block(self, number).await
    }
}
