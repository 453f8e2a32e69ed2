use tokio::sync::mpsc;

use crate::db::Table;
use crate::domain::{BlockCount, BlockCountIndex};
use crate::error::IndexerError;
use crate::kv::{counter_key, KvStore, UNSEEDED};
use crate::loader::fatal;

/// The counter loader: an INSERT-then-act guard so a given block number is
/// counted at most once no matter how many times it passes through the
/// loader.
pub async fn run_block_count_loader<T: Table, K: KvStore>(
    table: T,
    kv: K,
    network_name: String,
    mut receiver: mpsc::Receiver<BlockCount>,
) {
    while let Some(message) = receiver.recv().await {
        if let Err(err) = count_one(&table, &kv, &network_name, message.number).await {
            fatal("block_count_loader", err);
        }
    }
}

async fn count_one<T: Table, K: KvStore>(
    table: &T,
    kv: &K,
    network_name: &str,
    number: u32,
) -> Result<(), IndexerError> {
    let inserted = table
        .try_insert_block_count_index(&BlockCountIndex { number })
        .await?;
    if !inserted {
        // Already counted; each block number must contribute at most once
        // regardless of replay.
        return Ok(());
    }

    let key = counter_key(network_name, "block");
    let count = if kv.get_counter(&key).await? == UNSEEDED {
        // First use: the relational count already reflects the row we just
        // inserted above, so seeding is itself the increment.
        let seed = table.count_block_count_index().await? as i64;
        kv.set_counter(&key, seed).await?;
        seed
    } else {
        kv.incr_counter(&key).await?
    };

    table
        .upsert_block_count(&BlockCount {
            count_type: "block".to_string(),
            count: count as u64,
            number,
        })
        .await
}
