//! Per-entity SQL: `SparseRow` impls for the sparse-UPSERT path plus the
//! explicit reads each loader and the HTTP surface need.

use sqlx::{PgPool, Row};

use crate::db::{sparse_upsert, SparseRow, SqlValue};
use crate::domain::{
    normalize_hash, Block, BlockCount, BlockCountIndex, BlockFailedTransaction,
    BlockInternalTransaction, BlockTime, BlockTransaction, BlockWebsocketIndex,
};
use crate::error::IndexerError;

impl SparseRow for Block {
    const TABLE: &'static str = "blocks";
    const PRIMARY_KEY: &'static [&'static str] = &["number"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("number", SqlValue::I64(self.number as i64)),
            ("hash", SqlValue::Text(normalize_hash(&self.hash))),
            ("parent_hash", SqlValue::Text(normalize_hash(&self.parent_hash))),
            ("peer_id", SqlValue::Text(self.peer_id.clone())),
            ("timestamp", SqlValue::I64(self.timestamp as i64)),
            ("merkle_root_hash", SqlValue::Text(self.merkle_root_hash.clone())),
            ("version", SqlValue::Text(self.version.clone())),
            ("type", SqlValue::Text(self.block_type.clone())),
            ("item_id", SqlValue::Text(self.item_id.clone())),
            ("item_timestamp", SqlValue::Text(self.item_timestamp.clone())),
            ("signature", SqlValue::Text(self.signature.clone())),
            ("next_leader", SqlValue::Text(self.next_leader.clone())),
            ("transaction_count", SqlValue::I64(self.transaction_count as i64)),
            ("transaction_fees", sparse_hex(&self.transaction_fees)),
            ("transaction_amount", sparse_hex(&self.transaction_amount)),
            (
                "internal_transaction_amount",
                sparse_hex(&self.internal_transaction_amount),
            ),
            (
                "internal_transaction_count",
                SqlValue::I64(self.internal_transaction_count as i64),
            ),
            (
                "failed_transaction_count",
                SqlValue::I64(self.failed_transaction_count as i64),
            ),
            ("block_time", SqlValue::I64(self.block_time as i64)),
        ]
    }
}

/// "0x0" is the canonical hex zero value and must be treated as zero for
/// the sparse rule, not as a non-empty string that would always win a merge.
fn sparse_hex(value: &str) -> SqlValue {
    if value.is_empty() || value == "0x0" {
        SqlValue::Text(String::new())
    } else {
        SqlValue::Text(value.to_string())
    }
}

impl SparseRow for BlockTransaction {
    const TABLE: &'static str = "block_transactions";
    const PRIMARY_KEY: &'static [&'static str] = &["transaction_hash"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("transaction_hash", SqlValue::Text(normalize_hash(&self.transaction_hash))),
            ("number", SqlValue::I64(self.number as i64)),
            ("fee", sparse_hex(&self.fee)),
            ("amount", sparse_hex(&self.amount)),
        ]
    }
}

impl SparseRow for BlockFailedTransaction {
    const TABLE: &'static str = "block_failed_transactions";
    const PRIMARY_KEY: &'static [&'static str] = &["transaction_hash"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("transaction_hash", SqlValue::Text(normalize_hash(&self.transaction_hash))),
            ("number", SqlValue::I64(self.number as i64)),
        ]
    }
}

impl SparseRow for BlockInternalTransaction {
    const TABLE: &'static str = "block_internal_transactions";
    const PRIMARY_KEY: &'static [&'static str] = &["transaction_hash", "log_index"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("transaction_hash", SqlValue::Text(normalize_hash(&self.transaction_hash))),
            ("log_index", SqlValue::I64(self.log_index as i64)),
            ("number", SqlValue::I64(self.number as i64)),
            ("amount", sparse_hex(&self.amount)),
        ]
    }
}

impl SparseRow for BlockTime {
    const TABLE: &'static str = "block_times";
    const PRIMARY_KEY: &'static [&'static str] = &["number"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("number", SqlValue::I64(self.number as i64)),
            ("time", SqlValue::I64(self.time as i64)),
        ]
    }
}

impl SparseRow for BlockCount {
    const TABLE: &'static str = "block_counts";
    const PRIMARY_KEY: &'static [&'static str] = &["type"];

    fn columns(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("type", SqlValue::Text(self.count_type.clone())),
            ("count", SqlValue::I64(self.count as i64)),
            ("number", SqlValue::I64(self.number as i64)),
        ]
    }
}

/// Children of a block, fetched during enrichment.
pub struct BlockChildren {
    pub transactions: Vec<BlockTransaction>,
    pub internal_transactions: Vec<BlockInternalTransaction>,
    pub failed_transactions: Vec<BlockFailedTransaction>,
    pub block_time: Option<BlockTime>,
}

pub async fn fetch_block_children(
    pool: &PgPool,
    number: u32,
) -> Result<BlockChildren, IndexerError> {
    let transactions = sqlx::query(
        "SELECT transaction_hash, number, fee, amount FROM block_transactions WHERE number = $1",
    )
    .bind(number as i64)
    .fetch_all(pool)
    .await
    .map_err(|err| IndexerError::Fatal(err.into()))?
    .into_iter()
    .map(|row| BlockTransaction {
        transaction_hash: row.get("transaction_hash"),
        number: row.get::<i64, _>("number") as u32,
        fee: row.get("fee"),
        amount: row.get("amount"),
    })
    .collect();

    let internal_transactions = sqlx::query(
        "SELECT transaction_hash, log_index, number, amount FROM block_internal_transactions WHERE number = $1",
    )
    .bind(number as i64)
    .fetch_all(pool)
    .await
    .map_err(|err| IndexerError::Fatal(err.into()))?
    .into_iter()
    .map(|row| BlockInternalTransaction {
        transaction_hash: row.get("transaction_hash"),
        log_index: row.get::<i64, _>("log_index") as u32,
        number: row.get::<i64, _>("number") as u32,
        amount: row.get("amount"),
    })
    .collect();

    let failed_transactions = sqlx::query(
        "SELECT transaction_hash, number FROM block_failed_transactions WHERE number = $1",
    )
    .bind(number as i64)
    .fetch_all(pool)
    .await
    .map_err(|err| IndexerError::Fatal(err.into()))?
    .into_iter()
    .map(|row| BlockFailedTransaction {
        transaction_hash: row.get("transaction_hash"),
        number: row.get::<i64, _>("number") as u32,
    })
    .collect();

    let block_time = sqlx::query("SELECT number, time FROM block_times WHERE number = $1")
        .bind(number as i64)
        .fetch_optional(pool)
        .await
        .map_err(|err| IndexerError::Fatal(err.into()))?
        .map(|row| BlockTime {
            number: row.get::<i64, _>("number") as u32,
            time: row.get::<i64, _>("time") as u64,
        });

    Ok(BlockChildren {
        transactions,
        internal_transactions,
        failed_transactions,
        block_time,
    })
}

pub async fn select_block(pool: &PgPool, number: u32) -> Result<Block, IndexerError> {
    sqlx::query(
        "SELECT number, hash, parent_hash, peer_id, timestamp, merkle_root_hash, version, type, \
         item_id, item_timestamp, signature, next_leader, transaction_count, transaction_fees, \
         transaction_amount, internal_transaction_amount, internal_transaction_count, \
         failed_transaction_count, block_time FROM blocks WHERE number = $1",
    )
    .bind(number as i64)
    .fetch_optional(pool)
    .await
    .map_err(|err| IndexerError::Fatal(err.into()))?
    .map(row_to_block)
    .ok_or(IndexerError::NotFound)
}

/// Filters accepted when listing blocks.
#[derive(Debug, Clone, Default)]
pub struct BlockFilters {
    pub limit: u32,
    pub skip: u32,
    pub number: Option<u32>,
    pub start_number: Option<u32>,
    pub end_number: Option<u32>,
    pub hash: Option<String>,
    pub created_by: Option<String>,
}

impl BlockFilters {
    /// Validates and normalizes caller-supplied paging/range parameters,
    /// applying the default limit and the `start <= end` invariant.
    pub fn validated(mut self, max_page_size: u32) -> Result<Self, IndexerError> {
        if self.limit == 0 {
            self.limit = 25;
        }
        if self.limit > max_page_size {
            return Err(IndexerError::ClientError(format!(
                "limit must be between 1 and {max_page_size}"
            )));
        }
        if let (Some(start), Some(end)) = (self.start_number, self.end_number) {
            if start > end {
                return Err(IndexerError::ClientError(
                    "start_number must be <= end_number".to_string(),
                ));
            }
        }
        if let Some(hash) = &self.hash {
            self.hash = Some(normalize_hash(hash));
        }
        Ok(self)
    }
}

pub async fn select_blocks(
    pool: &PgPool,
    filters: &BlockFilters,
) -> Result<Vec<Block>, IndexerError> {
    let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT number, hash, parent_hash, peer_id, timestamp, merkle_root_hash, version, type, \
         item_id, item_timestamp, signature, next_leader, transaction_count, transaction_fees, \
         transaction_amount, internal_transaction_amount, internal_transaction_count, \
         failed_transaction_count, block_time FROM blocks WHERE 1=1",
    );

    if let Some(number) = filters.number {
        builder.push(" AND number = ").push_bind(number as i64);
    }
    if let Some(start) = filters.start_number {
        builder.push(" AND number >= ").push_bind(start as i64);
    }
    if let Some(end) = filters.end_number {
        builder.push(" AND number <= ").push_bind(end as i64);
    }
    if let Some(hash) = &filters.hash {
        builder.push(" AND hash = ").push_bind(hash.clone());
    }
    builder.push(" ORDER BY number DESC");
    builder.push(" LIMIT ").push_bind(filters.limit as i64);
    builder.push(" OFFSET ").push_bind(filters.skip as i64);

    let rows = builder
        .build()
        .fetch_all(pool)
        .await
        .map_err(|err| IndexerError::Fatal(err.into()))?;

    Ok(rows.into_iter().map(row_to_block).collect())
}

fn row_to_block(row: sqlx::postgres::PgRow) -> Block {
    Block {
        number: row.get::<i64, _>("number") as u32,
        hash: row.get("hash"),
        parent_hash: row.get("parent_hash"),
        peer_id: row.get("peer_id"),
        timestamp: row.get::<i64, _>("timestamp") as u64,
        merkle_root_hash: row.get("merkle_root_hash"),
        version: row.get("version"),
        block_type: row.get("type"),
        item_id: row.get("item_id"),
        item_timestamp: row.get("item_timestamp"),
        signature: row.get("signature"),
        next_leader: row.get("next_leader"),
        transaction_count: row.get::<i64, _>("transaction_count") as u32,
        transaction_fees: row.get("transaction_fees"),
        transaction_amount: row.get("transaction_amount"),
        internal_transaction_amount: row.get("internal_transaction_amount"),
        internal_transaction_count: row.get::<i64, _>("internal_transaction_count") as u32,
        failed_transaction_count: row.get::<i64, _>("failed_transaction_count") as u32,
        block_time: row.get::<i64, _>("block_time") as u64,
    }
}

/// Counts rows in a table, used to seed `BlockCount` on first use.
pub async fn count_block_count_index(pool: &PgPool) -> Result<u64, IndexerError> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM block_count_indices")
        .fetch_one(pool)
        .await
        .map_err(|err| IndexerError::Fatal(err.into()))?;
    Ok(row.get::<i64, _>("n") as u64)
}

/// Attempts to insert the witness row for counting a block exactly once.
/// Returns `true` if this call performed the insert (the block had not been
/// counted before), `false` if it was already present.
pub async fn try_insert_block_count_index(
    pool: &PgPool,
    index: &BlockCountIndex,
) -> Result<bool, IndexerError> {
    let result = sqlx::query(
        "INSERT INTO block_count_indices (number) VALUES ($1) ON CONFLICT (number) DO NOTHING",
    )
    .bind(index.number as i64)
    .execute(pool)
    .await
    .map_err(|err| IndexerError::Fatal(err.into()))?;

    Ok(result.rows_affected() == 1)
}

/// Attempts to insert the witness row for publishing a block exactly once.
/// Returns `true` if this call performed the insert.
pub async fn try_insert_block_websocket_index(
    pool: &PgPool,
    index: &BlockWebsocketIndex,
) -> Result<bool, IndexerError> {
    let result = sqlx::query(
        "INSERT INTO block_websocket_indices (number, hash, transaction_count, timestamp) \
         VALUES ($1, $2, $3, $4) ON CONFLICT (number) DO NOTHING",
    )
    .bind(index.number as i64)
    .bind(normalize_hash(&index.hash))
    .bind(index.transaction_count as i64)
    .bind(index.timestamp as i64)
    .execute(pool)
    .await
    .map_err(|err| IndexerError::Fatal(err.into()))?;

    Ok(result.rows_affected() == 1)
}

pub async fn upsert_block(pool: &PgPool, block: &Block) -> Result<(), IndexerError> {
    sparse_upsert(pool, block).await
}

pub async fn upsert_block_transaction(
    pool: &PgPool,
    row: &BlockTransaction,
) -> Result<(), IndexerError> {
    sparse_upsert(pool, row).await
}

pub async fn upsert_block_failed_transaction(
    pool: &PgPool,
    row: &BlockFailedTransaction,
) -> Result<(), IndexerError> {
    sparse_upsert(pool, row).await
}

pub async fn upsert_block_internal_transaction(
    pool: &PgPool,
    row: &BlockInternalTransaction,
) -> Result<(), IndexerError> {
    sparse_upsert(pool, row).await
}

pub async fn upsert_block_time(pool: &PgPool, row: &BlockTime) -> Result<(), IndexerError> {
    sparse_upsert(pool, row).await
}

pub async fn upsert_block_count(pool: &PgPool, row: &BlockCount) -> Result<(), IndexerError> {
    sparse_upsert(pool, row).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_default_limit_is_25() {
        let filters = BlockFilters::default().validated(1000).unwrap();
        assert_eq!(filters.limit, 25);
    }

    #[test]
    fn filters_reject_limit_above_max() {
        let filters = BlockFilters {
            limit: 2000,
            ..Default::default()
        };
        assert!(matches!(
            filters.validated(1000),
            Err(IndexerError::ClientError(_))
        ));
    }

    #[test]
    fn filters_reject_inverted_range() {
        let filters = BlockFilters {
            start_number: Some(10),
            end_number: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            filters.validated(1000),
            Err(IndexerError::ClientError(_))
        ));
    }

    #[test]
    fn filters_normalize_hash_prefix() {
        let filters = BlockFilters {
            hash: Some("0xAABB".to_string()),
            ..Default::default()
        }
        .validated(1000)
        .unwrap();
        assert_eq!(filters.hash.as_deref(), Some("aabb"));
    }

    #[test]
    fn sparse_hex_treats_k6_zero_as_empty() {
        let tx = BlockTransaction {
            transaction_hash: "abc".to_string(),
            number: 1,
            fee: "0x0".to_string(),
            amount: "0x10".to_string(),
        };
        let columns = tx.columns();
        let fee = columns.iter().find(|(n, _)| *n == "fee").unwrap();
        match &fee.1 {
            SqlValue::Text(v) => assert!(v.is_empty()),
            _ => panic!("expected text"),
        }
    }
}
