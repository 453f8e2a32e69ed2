use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DbConfig;
use crate::retry;

/// Connects to Postgres, retrying with the shared exponential backoff policy
/// until a connection succeeds, rather than failing fast.
pub async fn connect(config: &DbConfig) -> anyhow::Result<PgPool> {
    let url = config.connection_url();
    backoff::future::retry(retry::policy(), || async {
        PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "postgres connection attempt failed, retrying");
                backoff::Error::transient(err)
            })
    })
    .await
    .map_err(anyhow::Error::from)
}

/// Creates every table and index the core depends on, idempotently.
pub async fn migrate_all(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blocks (
            number BIGINT PRIMARY KEY,
            hash TEXT NOT NULL DEFAULT '',
            parent_hash TEXT NOT NULL DEFAULT '',
            peer_id TEXT NOT NULL DEFAULT '',
            timestamp BIGINT NOT NULL DEFAULT 0,
            merkle_root_hash TEXT NOT NULL DEFAULT '',
            version TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL DEFAULT '',
            item_id TEXT NOT NULL DEFAULT '',
            item_timestamp TEXT NOT NULL DEFAULT '',
            signature TEXT NOT NULL DEFAULT '',
            next_leader TEXT NOT NULL DEFAULT '',
            transaction_count BIGINT NOT NULL DEFAULT 0,
            transaction_fees TEXT NOT NULL DEFAULT '0x0',
            transaction_amount TEXT NOT NULL DEFAULT '0x0',
            internal_transaction_amount TEXT NOT NULL DEFAULT '0x0',
            internal_transaction_count BIGINT NOT NULL DEFAULT 0,
            failed_transaction_count BIGINT NOT NULL DEFAULT 0,
            block_time BIGINT NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS blocks_hash_idx ON blocks (hash);
        CREATE INDEX IF NOT EXISTS blocks_peer_id_idx ON blocks (peer_id);

        CREATE TABLE IF NOT EXISTS block_transactions (
            transaction_hash TEXT PRIMARY KEY,
            number BIGINT NOT NULL DEFAULT 0,
            fee TEXT NOT NULL DEFAULT '0x0',
            amount TEXT NOT NULL DEFAULT '0x0'
        );
        CREATE INDEX IF NOT EXISTS block_transactions_number_idx ON block_transactions (number);

        CREATE TABLE IF NOT EXISTS block_failed_transactions (
            transaction_hash TEXT PRIMARY KEY,
            number BIGINT NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS block_failed_transactions_number_idx ON block_failed_transactions (number);

        CREATE TABLE IF NOT EXISTS block_internal_transactions (
            transaction_hash TEXT NOT NULL DEFAULT '',
            log_index BIGINT NOT NULL DEFAULT 0,
            number BIGINT NOT NULL DEFAULT 0,
            amount TEXT NOT NULL DEFAULT '0x0',
            PRIMARY KEY (transaction_hash, log_index)
        );
        CREATE INDEX IF NOT EXISTS block_internal_transactions_number_idx ON block_internal_transactions (number);

        CREATE TABLE IF NOT EXISTS block_times (
            number BIGINT PRIMARY KEY,
            time BIGINT NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS block_counts (
            type TEXT PRIMARY KEY,
            count BIGINT NOT NULL DEFAULT 0,
            number BIGINT NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS block_count_indices (
            number BIGINT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS block_missing (
            number BIGINT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS block_websocket_indices (
            number BIGINT PRIMARY KEY,
            hash TEXT NOT NULL DEFAULT '',
            transaction_count BIGINT NOT NULL DEFAULT 0,
            timestamp BIGINT NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
