//! External in-memory key/value + pub-sub coordinator: one client, one
//! dedicated pub-sub connection, opened once at startup and shared
//! process-wide.

use std::time::Duration;

use redis::AsyncCommands;
use tokio::sync::mpsc;

use crate::config::KvConfig;
use crate::error::IndexerError;

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Sentinel returned by [`KvStore::get_counter`] when the counter key has
/// never been set, meaning the caller must seed it from the relational store.
pub const UNSEEDED: i64 = -1;

/// The counter/pub-sub operations a loader needs, abstracted over the
/// concrete backend so loaders can run against an in-memory fake in tests.
/// `subscribe_forwarding` and `connect` stay inherent on [`RedisKv`] since
/// only the composition roots, never a loader, call them.
pub trait KvStore: Clone + Send + Sync + 'static {
    /// Reads an integer counter, returning [`UNSEEDED`] if it has never been set.
    async fn get_counter(&self, key: &str) -> Result<i64, IndexerError>;

    /// Seeds a counter to an absolute value (used once, when `UNSEEDED`).
    async fn set_counter(&self, key: &str, value: i64) -> Result<(), IndexerError>;

    /// Atomically increments a counter by one, returning the new value.
    async fn incr_counter(&self, key: &str) -> Result<i64, IndexerError>;

    /// Publishes a payload on the configured channel. Implementations retry
    /// forever: a dropped notification cannot be recovered later.
    async fn publish(&self, payload: &str);
}

#[derive(Clone)]
pub struct RedisKv {
    client: redis::Client,
    channel: String,
}

impl RedisKv {
    pub async fn connect(config: &KvConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(config.connection_url())?;
        let mut conn = tokio::time::timeout(CALL_TIMEOUT, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| anyhow::anyhow!("redis connection timed out"))??;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            client,
            channel: config.channel.clone(),
        })
    }

    async fn try_publish(&self, payload: &str) -> Result<(), IndexerError> {
        let mut conn = self.connection().await?;
        tokio::time::timeout(
            CALL_TIMEOUT,
            conn.publish::<_, _, ()>(&self.channel, payload),
        )
        .await
        .map_err(|_| IndexerError::Transient(anyhow::anyhow!("redis PUBLISH timed out")))?
        .map_err(|err| IndexerError::Transient(err.into()))
    }

    /// Subscribes to the configured channel and forwards every message onto
    /// `out`, bridging externally-published updates into a process-local
    /// broadcaster for WS fan-out. Both paths carry identical payloads.
    pub async fn subscribe_forwarding(&self, out: mpsc::Sender<String>) -> anyhow::Result<()> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        let mut stream = pubsub.on_message();
        while let Some(msg) = futures::StreamExt::next(&mut stream).await {
            let payload: String = msg.get_payload()?;
            if out.send(payload).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, IndexerError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| IndexerError::Transient(err.into()))
    }
}

impl KvStore for RedisKv {
    async fn get_counter(&self, key: &str) -> Result<i64, IndexerError> {
        let mut conn = self.connection().await?;
        let value: Option<i64> = tokio::time::timeout(CALL_TIMEOUT, conn.get(key))
            .await
            .map_err(|_| IndexerError::Transient(anyhow::anyhow!("redis GET timed out")))?
            .map_err(|err| IndexerError::Transient(err.into()))?;
        Ok(value.unwrap_or(UNSEEDED))
    }

    async fn set_counter(&self, key: &str, value: i64) -> Result<(), IndexerError> {
        let mut conn = self.connection().await?;
        tokio::time::timeout(CALL_TIMEOUT, conn.set::<_, _, ()>(key, value))
            .await
            .map_err(|_| IndexerError::Transient(anyhow::anyhow!("redis SET timed out")))?
            .map_err(|err| IndexerError::Transient(err.into()))?;
        Ok(())
    }

    async fn incr_counter(&self, key: &str) -> Result<i64, IndexerError> {
        let mut conn = self.connection().await?;
        tokio::time::timeout(CALL_TIMEOUT, conn.incr(key, 1))
            .await
            .map_err(|_| IndexerError::Transient(anyhow::anyhow!("redis INCR timed out")))?
            .map_err(|err| IndexerError::Transient(err.into()))
    }

    /// Retries every 3 seconds with a 10s per-attempt timeout, forever.
    async fn publish(&self, payload: &str) {
        loop {
            match self.try_publish(payload).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(error = %err, "redis publish failed, retrying in 3s");
                    tokio::time::sleep(Duration::from_secs(3)).await;
                }
            }
        }
    }
}

/// The Redis key for a type's persistent counter, e.g. `icon_blocks_block_count_block`.
pub fn counter_key(network_name: &str, count_type: &str) -> String {
    format!("{network_name}_block_count_{count_type}")
}
