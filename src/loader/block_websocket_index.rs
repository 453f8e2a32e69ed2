use tokio::sync::mpsc;

use crate::broadcaster::Broadcaster;
use crate::db::Table;
use crate::domain::{BlockWebsocketIndex, BlockWsProjection};
use crate::error::IndexerError;
use crate::kv::KvStore;
use crate::loader::fatal;

/// The publish loader: an INSERT-then-act guard so a given block number is
/// published at most once. Publishes to both the external pub-sub channel
/// (for the pub-sub-backed WS path) and the in-process broadcaster (for
/// sessions served by this process directly), with identical payloads on
/// both paths.
pub async fn run_block_websocket_index_loader<T: Table, K: KvStore>(
    table: T,
    kv: K,
    broadcaster: Broadcaster,
    mut receiver: mpsc::Receiver<BlockWebsocketIndex>,
) {
    while let Some(message) = receiver.recv().await {
        if let Err(err) = publish_one(&table, &kv, &broadcaster, message).await {
            fatal("block_websocket_index_loader", err);
        }
    }
}

async fn publish_one<T: Table, K: KvStore>(
    table: &T,
    kv: &K,
    broadcaster: &Broadcaster,
    index: BlockWebsocketIndex,
) -> Result<(), IndexerError> {
    let inserted = table.try_insert_block_websocket_index(&index).await?;
    if !inserted {
        return Ok(());
    }

    let projection = BlockWsProjection::from(&index);
    let payload = serde_json::to_string(&projection)
        .map_err(|err| IndexerError::Fatal(err.into()))?;

    kv.publish(&payload).await;
    broadcaster.publish(projection);

    Ok(())
}
