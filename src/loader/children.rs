use std::future::Future;

use tokio::sync::mpsc;

use crate::db::Table;
use crate::domain::{BlockFailedTransaction, BlockInternalTransaction, BlockTime, BlockTransaction};
use crate::error::IndexerError;
use crate::loader::{fatal, BlockLoaderMessage, ReloadBus};

/// The shared shape of every child-entity loader: UPSERT, then enqueue the
/// affected block number onto the reload bus. Child loaders
/// differ only in which table they write and how they recover the block
/// number from their message, both passed in as plain function pointers
/// (none of the per-entity upsert functions capture anything).
async fn run<M, F, T>(
    table: T,
    mut receiver: mpsc::Receiver<M>,
    reload: ReloadBus,
    name: &'static str,
    number_of: fn(&M) -> u32,
    upsert: fn(T, M) -> F,
) where
    F: Future<Output = Result<(), IndexerError>>,
    T: Table,
{
    while let Some(message) = receiver.recv().await {
        let number = number_of(&message);
        if let Err(err) = upsert(table.clone(), message).await {
            fatal(name, err);
        }
        if reload
            .send(BlockLoaderMessage::Reload(number))
            .await
            .is_err()
        {
            tracing::info!(%name, "reload bus closed, stopping loader");
            break;
        }
    }
}

async fn upsert_transaction<T: Table>(table: T, row: BlockTransaction) -> Result<(), IndexerError> {
    table.upsert_block_transaction(&row).await
}

pub async fn run_block_transaction_loader<T: Table>(
    table: T,
    receiver: mpsc::Receiver<BlockTransaction>,
    reload: ReloadBus,
) {
    run(
        table,
        receiver,
        reload,
        "block_transaction_loader",
        |row| row.number,
        upsert_transaction,
    )
    .await
}

async fn upsert_failed_transaction<T: Table>(
    table: T,
    row: BlockFailedTransaction,
) -> Result<(), IndexerError> {
    table.upsert_block_failed_transaction(&row).await
}

pub async fn run_block_failed_transaction_loader<T: Table>(
    table: T,
    receiver: mpsc::Receiver<BlockFailedTransaction>,
    reload: ReloadBus,
) {
    run(
        table,
        receiver,
        reload,
        "block_failed_transaction_loader",
        |row| row.number,
        upsert_failed_transaction,
    )
    .await
}

async fn upsert_internal_transaction<T: Table>(
    table: T,
    row: BlockInternalTransaction,
) -> Result<(), IndexerError> {
    table.upsert_block_internal_transaction(&row).await
}

pub async fn run_block_internal_transaction_loader<T: Table>(
    table: T,
    receiver: mpsc::Receiver<BlockInternalTransaction>,
    reload: ReloadBus,
) {
    run(
        table,
        receiver,
        reload,
        "block_internal_transaction_loader",
        |row| row.number,
        upsert_internal_transaction,
    )
    .await
}

async fn upsert_time<T: Table>(table: T, row: BlockTime) -> Result<(), IndexerError> {
    table.upsert_block_time(&row).await
}

pub async fn run_block_time_loader<T: Table>(
    table: T,
    receiver: mpsc::Receiver<BlockTime>,
    reload: ReloadBus,
) {
    run(
        table,
        receiver,
        reload,
        "block_time_loader",
        |row| row.number,
        upsert_time,
    )
    .await
}
