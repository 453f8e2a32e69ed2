//! Pipeline-level tests: wire the real loaders to the in-memory `FakeTable`/
//! `FakeKv` and drive them over actual channels, so the cross-message
//! invariants (order independence, replay idempotence, at-most-once publish)
//! are exercised end to end instead of function-by-function.

#![cfg(test)]

use tokio::sync::mpsc;

use crate::broadcaster::Broadcaster;
use crate::domain::{RawBlock, RawTransaction};
use crate::kv::{counter_key, KvStore};
use crate::loader::block::{run_block_loader, BlockLoaderMessage};
use crate::loader::block_count::run_block_count_loader;
use crate::loader::block_websocket_index::run_block_websocket_index_loader;
use crate::loader::children::run_block_transaction_loader;
use crate::testing::{FakeKv, FakeTable};
use crate::transform::blocks::transform_block;
use crate::transform::transactions::transform_transaction;

#[tokio::test]
async fn cold_block_with_no_children_defaults_aggregates_to_hex_zero() {
    let table = FakeTable::new();
    let kv = FakeKv::new();
    let broadcaster = Broadcaster::new();

    let raw = RawBlock {
        number: 100,
        hash: "0xaa".to_string(),
        transaction_count: 0,
        timestamp: 1_700_000_000_000_000,
        ..Default::default()
    };
    let out = transform_block(&raw);

    let (block_tx, block_rx) = mpsc::channel(8);
    let (count_tx, count_rx) = mpsc::channel(8);
    let (ws_tx, ws_rx) = mpsc::channel(8);

    let block_task = tokio::spawn(run_block_loader(table.clone(), block_rx));
    let count_task = tokio::spawn(run_block_count_loader(
        table.clone(),
        kv.clone(),
        "icon".to_string(),
        count_rx,
    ));
    let ws_task = tokio::spawn(run_block_websocket_index_loader(
        table.clone(),
        kv.clone(),
        broadcaster.clone(),
        ws_rx,
    ));

    block_tx
        .send(BlockLoaderMessage::Identity(Box::new(out.block)))
        .await
        .unwrap();
    count_tx.send(out.count).await.unwrap();
    ws_tx.send(out.websocket_index).await.unwrap();

    drop(block_tx);
    drop(count_tx);
    drop(ws_tx);
    block_task.await.unwrap();
    count_task.await.unwrap();
    ws_task.await.unwrap();

    let block = table.block(100).expect("block 100 was upserted");
    assert_eq!(block.transaction_fees, "0x0");
    assert_eq!(block.transaction_amount, "0x0");
    assert_eq!(block.internal_transaction_amount, "0x0");
    assert_eq!(block.transaction_count, 0);

    assert_eq!(kv.published().len(), 1);
    assert_eq!(
        kv.get_counter(&counter_key("icon", "block")).await.unwrap(),
        1
    );
    assert_eq!(table.block_count("block").unwrap().count, 1);
}

#[tokio::test]
async fn transaction_arriving_before_its_block_still_aggregates_correctly() {
    let table = FakeTable::new();

    let raw_transaction = RawTransaction {
        block_number: 101,
        hash: "0xtx101".to_string(),
        receipt_step_price: "0x10".to_string(),
        receipt_step_used: "0x1".to_string(),
        value: "0x100".to_string(),
        receipt_status: 1,
        ..Default::default()
    };
    let transaction = transform_transaction(&raw_transaction).unwrap().transaction;

    let raw_block = RawBlock {
        number: 101,
        hash: "0xbb".to_string(),
        ..Default::default()
    };
    let block = transform_block(&raw_block).block;

    let (block_tx, block_rx) = mpsc::channel(8);
    let (transaction_tx, transaction_rx) = mpsc::channel(8);

    let block_task = tokio::spawn(run_block_loader(table.clone(), block_rx));
    let children_task = tokio::spawn(run_block_transaction_loader(
        table.clone(),
        transaction_rx,
        block_tx.clone(),
    ));

    // The transaction (and the reload it triggers) is fully processed before
    // the block's own identity message is sent, so the block row does not
    // exist yet when the aggregate is first computed.
    transaction_tx.send(transaction).await.unwrap();
    drop(transaction_tx);
    children_task.await.unwrap();

    block_tx
        .send(BlockLoaderMessage::Identity(Box::new(block)))
        .await
        .unwrap();
    drop(block_tx);
    block_task.await.unwrap();

    let block = table.block(101).expect("block 101 was upserted");
    assert_eq!(block.transaction_fees, "0x10");
    assert_eq!(block.transaction_amount, "0x100");
    assert_eq!(block.failed_transaction_count, 0);
}

#[tokio::test]
async fn duplicate_block_delivery_publishes_and_counts_exactly_once() {
    let table = FakeTable::new();
    let kv = FakeKv::new();
    let broadcaster = Broadcaster::new();

    let raw = RawBlock {
        number: 104,
        hash: "0xcc".to_string(),
        ..Default::default()
    };
    let out = transform_block(&raw);

    let (block_tx, block_rx) = mpsc::channel(8);
    let (count_tx, count_rx) = mpsc::channel(8);
    let (ws_tx, ws_rx) = mpsc::channel(8);

    let block_task = tokio::spawn(run_block_loader(table.clone(), block_rx));
    let count_task = tokio::spawn(run_block_count_loader(
        table.clone(),
        kv.clone(),
        "icon".to_string(),
        count_rx,
    ));
    let ws_task = tokio::spawn(run_block_websocket_index_loader(
        table.clone(),
        kv.clone(),
        broadcaster.clone(),
        ws_rx,
    ));

    for _ in 0..2 {
        block_tx
            .send(BlockLoaderMessage::Identity(Box::new(out.block.clone())))
            .await
            .unwrap();
        count_tx.send(out.count.clone()).await.unwrap();
        ws_tx.send(out.websocket_index.clone()).await.unwrap();
    }

    drop(block_tx);
    drop(count_tx);
    drop(ws_tx);
    block_task.await.unwrap();
    count_task.await.unwrap();
    ws_task.await.unwrap();

    assert!(table.block(104).is_some());
    assert_eq!(table.block_count("block").unwrap().count, 1);
    assert_eq!(kv.published().len(), 1);
    assert_eq!(table.websocket_index_count(), 1);
}
