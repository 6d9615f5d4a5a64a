//! In-process bus.
//!
//! [`LocalBus`] is a [`tokio::sync::broadcast`] backbone. Every
//! [`LocalBus::connect`] call yields a client with its own channel filter,
//! so several hubs in one process behave like separate instances sharing a
//! real pub/sub server.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{BusMessage, BusStream, FanoutBus};
use crate::error::ChatError;

/// Shared in-process backbone.
///
/// Backed by a `tokio::broadcast` channel. When the ring buffer is full,
/// the oldest messages are dropped for lagging clients.
#[derive(Debug, Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    /// Creates a backbone buffering up to `capacity` in-flight messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attaches a new client. The returned stream yields only messages on
    /// channels the client is subscribed to.
    #[must_use]
    pub fn connect(&self) -> (LocalBusClient, BusStream) {
        let channels = Arc::new(RwLock::new(HashSet::new()));
        let client = LocalBusClient {
            sender: self.sender.clone(),
            channels: Arc::clone(&channels),
        };

        let receiver = self.sender.subscribe();
        let messages = stream::unfold((receiver, channels), |(mut receiver, channels)| async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        if channels.read().await.contains(&message.channel) {
                            return Some((message, (receiver, channels)));
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "local bus client lagged, messages dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed();

        (client, messages)
    }

    #[cfg(test)]
    fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// One attachment to a [`LocalBus`].
#[derive(Debug)]
pub struct LocalBusClient {
    sender: broadcast::Sender<BusMessage>,
    channels: Arc<RwLock<HashSet<String>>>,
}

#[cfg(test)]
impl LocalBusClient {
    async fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.read().await.contains(channel)
    }
}

#[async_trait]
impl FanoutBus for LocalBusClient {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), ChatError> {
        // No attached clients is not an error: nobody is listening.
        let _ = self.sender.send(BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), ChatError> {
        self.channels.write().await.insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), ChatError> {
        self.channels.write().await.remove(channel);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn next(stream: &mut BusStream) -> Option<BusMessage> {
        tokio::time::timeout(Duration::from_millis(200), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn subscribed_client_receives() {
        let bus = LocalBus::default();
        let (client, mut stream) = bus.connect();
        tokio_test::assert_ok!(client.subscribe("user:1").await);
        tokio_test::assert_ok!(client.publish("user:1", "hello").await);

        let Some(message) = next(&mut stream).await else {
            panic!("expected a message");
        };
        assert_eq!(message.channel, "user:1");
        assert_eq!(message.payload, "hello");
    }

    #[tokio::test]
    async fn unsubscribed_channels_are_filtered() {
        let bus = LocalBus::default();
        let (client, mut stream) = bus.connect();
        let _ = client.subscribe("user:1").await;

        let _ = client.publish("user:2", "not for us").await;
        let _ = client.publish("user:1", "for us").await;

        let Some(message) = next(&mut stream).await else {
            panic!("expected a message");
        };
        assert_eq!(message.payload, "for us");
    }

    #[tokio::test]
    async fn clients_share_the_backbone() {
        let bus = LocalBus::default();
        let (a, _a_stream) = bus.connect();
        let (b, mut b_stream) = bus.connect();
        assert_eq!(bus.client_count(), 2);

        let _ = b.subscribe("user:2").await;
        let _ = a.publish("user:2", "cross").await;

        let Some(message) = next(&mut b_stream).await else {
            panic!("expected a message on the second client");
        };
        assert_eq!(message.payload, "cross");
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = LocalBus::default();
        let (client, mut stream) = bus.connect();
        tokio_test::assert_ok!(client.subscribe("user:1").await);
        assert!(client.is_subscribed("user:1").await);
        tokio_test::assert_ok!(client.unsubscribe("user:1").await);
        assert!(!client.is_subscribed("user:1").await);

        let _ = client.publish("user:1", "late").await;
        assert!(next(&mut stream).await.is_none());
    }
}
