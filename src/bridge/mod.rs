//! Distributed fanout bridge.
//!
//! The bridge connects the local hub to a shared publish/subscribe bus so
//! that instances sharing no memory can deliver to each other's sessions.
//!
//! ```text
//!   Hub ──publish(user:{id})──▶ FanoutBus ──▶ receive loop ──Deliver──▶ Hub
//!                                  ▲  (any instance)
//!   Hub ──subscribe/unsubscribe────┘
//! ```
//!
//! Two bus implementations exist: [`RedisBus`] for multi-instance
//! deployments and [`LocalBus`] for a single process and tests. The receive
//! loop only ever pushes events into the hub; it never reads hub state.

pub mod local;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio::task::JoinHandle;

use crate::domain::{BROADCAST_CHANNEL, RoutedEnvelope, UserId, user_channel};
use crate::error::ChatError;
use crate::hub::HubHandle;

pub use local::{LocalBus, LocalBusClient};
pub use self::redis::RedisBus;

/// Raw message received from a bus channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Serialized frame.
    pub payload: String,
}

/// Messages arriving on every channel the bus client is subscribed to.
pub type BusStream = BoxStream<'static, BusMessage>;

/// Publish/subscribe transport shared by every relay instance.
///
/// Implementations must tolerate concurrent `publish` calls from the hub
/// while their [`BusStream`] is drained by the receive loop.
#[async_trait]
pub trait FanoutBus: Send + Sync + std::fmt::Debug {
    /// Publishes `payload` on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the bus rejects the publish.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), ChatError>;

    /// Starts receiving messages published on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the subscription cannot be opened.
    async fn subscribe(&self, channel: &str) -> Result<(), ChatError>;

    /// Stops receiving messages published on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the subscription cannot be closed.
    async fn unsubscribe(&self, channel: &str) -> Result<(), ChatError>;
}

/// Hub-facing side of the bridge: maps envelopes and users onto bus
/// channels.
#[derive(Debug, Clone)]
pub struct FanoutBridge {
    bus: Arc<dyn FanoutBus>,
}

impl FanoutBridge {
    /// Wraps a bus client.
    #[must_use]
    pub fn new(bus: Arc<dyn FanoutBus>) -> Self {
        Self { bus }
    }

    /// Publishes an envelope on its routing channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the bus rejects the publish.
    pub async fn publish(&self, envelope: &RoutedEnvelope) -> Result<(), ChatError> {
        self.bus
            .publish(&envelope.channel(), envelope.payload().as_str())
            .await
    }

    /// Starts receiving addressed traffic for `user` on this instance.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the subscription cannot be opened.
    pub async fn subscribe_user(&self, user: UserId) -> Result<(), ChatError> {
        self.bus.subscribe(&user_channel(user)).await
    }

    /// Stops receiving addressed traffic for `user` on this instance.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the subscription cannot be closed.
    pub async fn unsubscribe_user(&self, user: UserId) -> Result<(), ChatError> {
        self.bus.unsubscribe(&user_channel(user)).await
    }

    /// Starts receiving broadcast traffic.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Bus`] if the subscription cannot be opened.
    pub async fn subscribe_broadcast(&self) -> Result<(), ChatError> {
        self.bus.subscribe(BROADCAST_CHANNEL).await
    }
}

/// Drains `stream`, turning every message into a `Deliver` event for the
/// hub. Returns when the stream ends or the hub stops.
pub async fn run_receive_loop(mut stream: BusStream, hub: HubHandle) {
    tracing::info!("bridge receive loop started");
    while let Some(message) = stream.next().await {
        let Some(envelope) = RoutedEnvelope::from_bus(&message.channel, message.payload) else {
            tracing::warn!(channel = %message.channel, "dropping bus message on unknown channel");
            continue;
        };
        if hub.deliver(envelope).is_err() {
            tracing::info!("hub stopped, ending bridge receive loop");
            return;
        }
    }
    tracing::error!("bus stream ended, bridge receive loop stopped");
}

/// Spawns [`run_receive_loop`] on the current runtime.
#[must_use]
pub fn spawn_receive_loop(stream: BusStream, hub: HubHandle) -> JoinHandle<()> {
    tokio::spawn(run_receive_loop(stream, hub))
}
