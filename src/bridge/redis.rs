//! Redis pub/sub bus.
//!
//! Publishing goes through a multiplexed connection that is cheap to clone
//! per call. Subscriptions live on a dedicated pub/sub connection split into
//! a command sink (subscribe/unsubscribe) and the message stream handed to
//! the bridge receive loop.
//!
//! The bus remembers every channel it is subscribed to. When the pub/sub
//! connection drops, the message stream reconnects, re-subscribes to that
//! set, and carries on, so the receive loop never sees the outage end its
//! stream.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, future, stream};
use redis::AsyncCommands;
use redis::aio::{MultiplexedConnection, PubSubSink, PubSubStream};
use tokio::sync::Mutex;

use super::{BusMessage, BusStream, FanoutBus};
use crate::error::ChatError;

/// Backoff unit between reconnect attempts; attempt `n` waits `n` units.
const RECONNECT_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound on the wait between reconnect attempts.
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

fn bus_err(e: redis::RedisError) -> ChatError {
    ChatError::Bus(e.to_string())
}

/// Command side of the pub/sub connection and the channels it must carry.
struct Subscriptions {
    sink: PubSubSink,
    channels: HashSet<String>,
}

/// Bus client backed by a Redis server shared by every relay instance.
pub struct RedisBus {
    publisher: MultiplexedConnection,
    subscriptions: Arc<Mutex<Subscriptions>>,
}

impl std::fmt::Debug for RedisBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBus").finish_non_exhaustive()
    }
}

impl RedisBus {
    /// Connects to `url` and returns the client together with the stream of
    /// messages on subscribed channels.
    ///
    /// The stream only ends if the client is dropped; connection loss is
    /// handled by reconnecting.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the URL is invalid or Redis is
    /// unreachable.
    pub async fn connect(url: &str) -> Result<(Self, BusStream), ChatError> {
        let client = redis::Client::open(url).map_err(bus_err)?;
        let publisher = client
            .get_multiplexed_async_connection()
            .await
            .map_err(bus_err)?;
        let (sink, messages) = client.get_async_pubsub().await.map_err(bus_err)?.split();
        let subscriptions = Arc::new(Mutex::new(Subscriptions {
            sink,
            channels: HashSet::new(),
        }));

        let shared = Arc::clone(&subscriptions);
        let messages = reconnecting(decoded(messages), move || {
            let client = client.clone();
            let shared = Arc::clone(&shared);
            async move { reopen(&client, &shared).await }
        });

        tracing::info!("connected to redis bus");
        Ok((
            Self {
                publisher,
                subscriptions,
            },
            messages,
        ))
    }
}

fn decoded(messages: PubSubStream) -> BusStream {
    messages
        .filter_map(|message| future::ready(decode(&message)))
        .boxed()
}

fn decode(message: &redis::Msg) -> Option<BusMessage> {
    let channel = message.get_channel_name().to_string();
    match message.get_payload::<String>() {
        Ok(payload) => Some(BusMessage { channel, payload }),
        Err(e) => {
            tracing::warn!(%channel, error = %e, "dropping undecodable redis payload");
            None
        }
    }
}

/// Yields from `first`, and whenever the current stream ends, switches to
/// the stream produced by `reconnect`.
fn reconnecting<F, Fut>(first: BusStream, reconnect: F) -> BusStream
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = BusStream> + Send + 'static,
{
    stream::unfold((first, reconnect), |(mut current, mut reconnect)| async move {
        loop {
            if let Some(message) = current.next().await {
                return Some((message, (current, reconnect)));
            }
            tracing::warn!("redis pub/sub stream ended, reconnecting");
            current = reconnect().await;
        }
    })
    .boxed()
}

/// Opens a fresh pub/sub connection, retrying until it succeeds.
async fn reopen(client: &redis::Client, subscriptions: &Mutex<Subscriptions>) -> BusStream {
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match resubscribe(client, subscriptions).await {
            Ok(messages) => {
                tracing::info!(attempt, "redis pub/sub reconnected");
                return messages;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "redis pub/sub reconnect failed");
                let backoff = (RECONNECT_BACKOFF * attempt).min(MAX_RECONNECT_BACKOFF);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

async fn resubscribe(
    client: &redis::Client,
    subscriptions: &Mutex<Subscriptions>,
) -> Result<BusStream, ChatError> {
    let (mut sink, messages) = client.get_async_pubsub().await.map_err(bus_err)?.split();
    let mut subscriptions = subscriptions.lock().await;
    for channel in &subscriptions.channels {
        sink.subscribe(channel).await.map_err(bus_err)?;
    }
    tracing::info!(channels = subscriptions.channels.len(), "redis subscriptions restored");
    subscriptions.sink = sink;
    Ok(decoded(messages))
}

#[async_trait]
impl FanoutBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), ChatError> {
        let mut conn = self.publisher.clone();
        let _: () = conn.publish(channel, payload).await.map_err(bus_err)?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), ChatError> {
        let mut subscriptions = self.subscriptions.lock().await;
        // Recorded first so a reconnect restores it even if this command
        // hits a dead connection.
        subscriptions.channels.insert(channel.to_string());
        subscriptions.sink.subscribe(channel).await.map_err(bus_err)
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), ChatError> {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.channels.remove(channel);
        subscriptions.sink.unsubscribe(channel).await.map_err(bus_err)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn message(channel: &str, payload: &str) -> BusMessage {
        BusMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        }
    }

    fn finite(messages: Vec<BusMessage>) -> BusStream {
        stream::iter(messages).boxed()
    }

    #[tokio::test]
    async fn ended_stream_is_replaced_by_reconnect() {
        let reconnects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reconnects);
        let mut messages = reconnecting(finite(vec![message("user:1", "before")]), move || {
            let round = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if round == 0 {
                    // A reconnect that drops again right away.
                    finite(Vec::new())
                } else {
                    finite(vec![message("user:1", "after")])
                }
            }
        });

        let Some(first) = messages.next().await else {
            panic!("expected the first message");
        };
        assert_eq!(first.payload, "before");
        let Some(second) = messages.next().await else {
            panic!("stream should survive the disconnect");
        };
        assert_eq!(second.payload, "after");
        assert_eq!(reconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reconnect_is_not_called_while_stream_is_live() {
        let reconnects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reconnects);
        let live = finite(vec![message("a", "1"), message("b", "2")]).chain(stream::pending());
        let mut messages = reconnecting(live.boxed(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            future::ready(finite(Vec::new()))
        });

        let mut payloads = Vec::new();
        for _ in 0..2 {
            let Some(next) = messages.next().await else {
                panic!("stream ended early");
            };
            payloads.push(next.payload);
        }
        assert_eq!(payloads, vec!["1", "2"]);
        assert_eq!(reconnects.load(Ordering::SeqCst), 0);
    }
}
