//! Composition root for the indexing pipeline. Wires broker consumer
//! adapters to transformers to per-entity loaders to the reload bus, then
//! waits for every task to finish (which only happens on shutdown).

use std::fs::File;

use icon_blocks_indexer::broadcaster::Broadcaster;
use icon_blocks_indexer::broker::spawn_consumer;
use icon_blocks_indexer::config::Config;
use icon_blocks_indexer::domain::{
    BlockCount, BlockFailedTransaction, BlockInternalTransaction, BlockTime, BlockTransaction,
    BlockWebsocketIndex, RawBlock, RawLog, RawTransaction,
};
use icon_blocks_indexer::loader::block::{run_block_loader, BlockLoaderMessage};
use icon_blocks_indexer::loader::block_count::run_block_count_loader;
use icon_blocks_indexer::loader::block_websocket_index::run_block_websocket_index_loader;
use icon_blocks_indexer::loader::children::{
    run_block_failed_transaction_loader, run_block_internal_transaction_loader,
    run_block_time_loader, run_block_transaction_loader,
};
use icon_blocks_indexer::observability::Observability;
use icon_blocks_indexer::{db, kv, metrics, transform};
use tokio::sync::mpsc;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let log_file = if config.log_to_file {
        Some(File::create(&config.log_file_name)?)
    } else {
        None
    };
    let _observability = Observability::init(
        vec!["indexer_worker".to_string()],
        LevelFilter::from(config.log_level),
        log_file,
    )?;
    config.print();

    metrics::install(config.metrics_port)?;

    let pool = db::connect(&config.db).await?;
    db::migrate_all(&pool).await?;
    let kv_store = kv::RedisKv::connect(&config.kv).await?;
    // No subscriber lives in this process; the api binary is the one that
    // forwards pub-sub messages to WS sessions. Publishing here is still
    // correct: a send with no subscribers is simply a no-op.
    let broadcaster = Broadcaster::new();

    // Reload bus: child loaders and the blocks transformer both feed this.
    let (block_tx, block_rx) = mpsc::channel::<BlockLoaderMessage>(1);

    let (transaction_tx, transaction_rx) = mpsc::channel::<BlockTransaction>(1);
    let (failed_tx, failed_rx) = mpsc::channel::<BlockFailedTransaction>(1);
    let (internal_tx, internal_rx) = mpsc::channel::<BlockInternalTransaction>(1);
    let (time_tx, time_rx) = mpsc::channel::<BlockTime>(1);
    let (count_tx, count_rx) = mpsc::channel::<BlockCount>(1);
    let (ws_index_tx, ws_index_rx) = mpsc::channel::<BlockWebsocketIndex>(1);

    tokio::spawn(run_block_loader(pool.clone(), block_rx));
    tokio::spawn(run_block_transaction_loader(
        pool.clone(),
        transaction_rx,
        block_tx.clone(),
    ));
    tokio::spawn(run_block_failed_transaction_loader(
        pool.clone(),
        failed_rx,
        block_tx.clone(),
    ));
    tokio::spawn(run_block_internal_transaction_loader(
        pool.clone(),
        internal_rx,
        block_tx.clone(),
    ));
    tokio::spawn(run_block_time_loader(pool.clone(), time_rx, block_tx.clone()));
    tokio::spawn(run_block_count_loader(
        pool.clone(),
        kv_store.clone(),
        config.network_name.clone(),
        count_rx,
    ));
    tokio::spawn(run_block_websocket_index_loader(
        pool.clone(),
        kv_store.clone(),
        broadcaster.clone(),
        ws_index_rx,
    ));

    spawn_blocks_transformer(&config, block_tx.clone(), count_tx, ws_index_tx);
    spawn_transactions_transformer(&config, transaction_tx, failed_tx);
    spawn_logs_transformer(&config, internal_tx);

    tracing::info!("indexer worker running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    Ok(())
}

fn spawn_blocks_transformer(
    config: &Config,
    block_tx: mpsc::Sender<BlockLoaderMessage>,
    count_tx: mpsc::Sender<BlockCount>,
    ws_index_tx: mpsc::Sender<BlockWebsocketIndex>,
) {
    let handle = spawn_consumer::<RawBlock>(
        config.broker.broker_url.clone(),
        config.broker.group_id.clone(),
        "blocks".to_string(),
    );
    let mut receiver = handle.receiver;

    tokio::spawn(async move {
        while let Some(raw) = receiver.recv().await {
            metrics::record_consumed("blocks");
            metrics::record_max_block_number("blocks", raw.number);
            let output = transform::blocks::transform_block(&raw);

            if block_tx
                .send(BlockLoaderMessage::Identity(Box::new(output.block)))
                .await
                .is_err()
            {
                break;
            }
            if count_tx.send(output.count).await.is_err() {
                break;
            }
            if ws_index_tx.send(output.websocket_index).await.is_err() {
                break;
            }
        }
    });
}

fn spawn_transactions_transformer(
    config: &Config,
    transaction_tx: mpsc::Sender<BlockTransaction>,
    failed_tx: mpsc::Sender<BlockFailedTransaction>,
) {
    let handle = spawn_consumer::<RawTransaction>(
        config.broker.broker_url.clone(),
        config.broker.group_id.clone(),
        "transactions".to_string(),
    );
    let mut receiver = handle.receiver;

    tokio::spawn(async move {
        while let Some(raw) = receiver.recv().await {
            metrics::record_consumed("transactions");
            let output = match transform::transactions::transform_transaction(&raw) {
                Ok(output) => output,
                Err(err) => panic!("fatal decode error in transactions transformer: {err}"),
            };

            if transaction_tx.send(output.transaction).await.is_err() {
                break;
            }
            if let Some(failed) = output.failed {
                if failed_tx.send(failed).await.is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_logs_transformer(config: &Config, internal_tx: mpsc::Sender<BlockInternalTransaction>) {
    let handle = spawn_consumer::<RawLog>(
        config.broker.broker_url.clone(),
        config.broker.group_id.clone(),
        "logs".to_string(),
    );
    let mut receiver = handle.receiver;

    tokio::spawn(async move {
        while let Some(raw) = receiver.recv().await {
            metrics::record_consumed("logs");
            let internal_transaction = match transform::logs::transform_log(&raw) {
                Ok(value) => value,
                Err(err) => panic!("fatal decode error in logs transformer: {err}"),
            };

            if let Some(internal_transaction) = internal_transaction {
                if internal_tx.send(internal_transaction).await.is_err() {
                    break;
                }
            }
        }
    });
}
