//! In-process fan-out for WebSocket sessions. Built on
//! `tokio::sync::broadcast`: a slow or stalled subscriber lags and silently
//! misses messages rather than ever blocking the publisher, matching the
//! desired non-blocking, best-effort-drop delivery contract.

use tokio::sync::broadcast;

use crate::domain::BlockWsProjection;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<BlockWsProjection>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Registers a new subscriber. The returned receiver lags (and silently
    /// drops the oldest unread messages) rather than stalling the publisher
    /// if it falls behind.
    pub fn subscribe(&self) -> broadcast::Receiver<BlockWsProjection> {
        self.sender.subscribe()
    }

    /// Delivers `projection` to every current subscriber. A subscriber with
    /// no active receivers (`SendError`) is simply a no-op: there is nothing
    /// to notify and nothing to fail.
    pub fn publish(&self, projection: BlockWsProjection) {
        let _ = self.sender.send(projection);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projection(number: u32) -> BlockWsProjection {
        BlockWsProjection {
            number,
            hash: "aabb".to_string(),
            transaction_count: 0,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_message() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        broadcaster.publish(projection(1));

        assert_eq!(a.recv().await.unwrap().number, 1);
        assert_eq!(b.recv().await.unwrap().number, 1);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let broadcaster = Broadcaster::new();
        broadcaster.publish(projection(1));
    }

    #[tokio::test]
    async fn removed_subscriber_does_not_affect_others() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.subscribe();
        {
            let _b = broadcaster.subscribe();
            // _b dropped here, simulating `remove`.
        }
        broadcaster.publish(projection(2));
        assert_eq!(a.recv().await.unwrap().number, 2);
    }
}
