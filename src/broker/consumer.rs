use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::broker::strip_frame;
use crate::retry;

/// A running consumer task plus the channel its decoded records arrive on.
/// Dropping the receiver (or the whole handle) does not stop the task; use a
/// process-wide cancellation signal for that.
pub struct ConsumerHandle<T> {
    pub receiver: mpsc::Receiver<T>,
}

fn build_consumer(broker_url: &str, group_id: &str) -> Result<StreamConsumer, KafkaError> {
    ClientConfig::new()
        .set("bootstrap.servers", broker_url)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("partition.assignment.strategy", "roundrobin")
        .create()
}

/// Spawns the consumer loop for a single topic. The outbound channel has a
/// 1-slot buffer, matching the loader channel's backpressure contract: a
/// slow transformer stalls this task before it stalls the broker.
///
/// Offsets are committed only once the decoded record has been accepted by
/// the downstream channel, so a crash between receive and accept is
/// replayed on restart (at-least-once).
///
/// On connection loss, the task reconnects with the shared exponential
/// backoff policy (500ms initial, 60s cap, no elapsed-time ceiling) and never
/// closes the channel; downstream sees a pause, never a close. Decode
/// failures are fatal and terminate the process, since they indicate schema
/// drift rather than a transient condition.
pub fn spawn_consumer<T>(
    broker_url: String,
    group_id: String,
    topic: String,
) -> ConsumerHandle<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            let consumer = match backoff::future::retry(retry::policy(), || async {
                build_consumer(&broker_url, &group_id).map_err(backoff::Error::transient)
            })
            .await
            {
                Ok(consumer) => consumer,
                Err(_) => continue, // unreachable: retry policy has no elapsed-time ceiling
            };

            if let Err(err) = consumer.subscribe(&[&topic]) {
                tracing::warn!(%topic, error = %err, "failed to subscribe, retrying");
                continue;
            }

            tracing::info!(%topic, %group_id, "consumer subscribed");

            loop {
                let message = match consumer.recv().await {
                    Ok(message) => message,
                    Err(err) => {
                        tracing::warn!(%topic, error = %err, "broker poll failed, reconnecting");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        break;
                    }
                };

                let payload = match message.payload() {
                    Some(payload) => payload,
                    None => continue,
                };

                let body = strip_frame(payload).unwrap_or_else(|err| {
                    panic!("fatal framing error on topic {topic}: {err}");
                });

                let record: T = serde_json::from_slice(body).unwrap_or_else(|err| {
                    panic!("fatal decode error on topic {topic}: {err}");
                });

                if sender.send(record).await.is_err() {
                    tracing::info!(%topic, "downstream channel closed, stopping consumer");
                    return;
                }

                if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::warn!(%topic, error = %err, "offset commit failed");
                }
            }
        }
    });

    ConsumerHandle { receiver }
}
