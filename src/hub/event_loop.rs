//! The hub event loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{HubEvent, HubHandle, HubStats, Registry, Removed, SessionHandle};
use crate::bridge::FanoutBridge;
use crate::domain::{BROADCAST_CHANNEL, ChatMessage, RoutedEnvelope, SessionId, UserId};
use crate::error::ChatError;
use crate::persistence::ChatStore;

/// Attempts made for a bus subscribe or unsubscribe before giving up.
const SUBSCRIPTION_ATTEMPTS: u32 = 3;

/// Backoff unit between subscription attempts; attempt `n` waits `n` units.
const SUBSCRIPTION_BACKOFF: Duration = Duration::from_millis(100);

/// Single-owner event loop over the session registry.
///
/// Created with [`Hub::new`], which also returns the [`HubHandle`] used to
/// feed it. The loop ends once every handle has been dropped. No single
/// event can stop it: store and bus failures are reported or logged and
/// the loop moves on to the next event.
#[derive(Debug)]
pub struct Hub {
    registry: Registry,
    store: Arc<dyn ChatStore>,
    bridge: FanoutBridge,
    echo_to_sender: bool,
    events: mpsc::UnboundedReceiver<HubEvent>,
}

impl Hub {
    /// Creates a hub and the handle that feeds it.
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        bridge: FanoutBridge,
        echo_to_sender: bool,
    ) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Self {
            registry: Registry::new(),
            store,
            bridge,
            echo_to_sender,
            events: rx,
        };
        (hub, HubHandle::new(tx))
    }

    /// Subscribes to the broadcast channel, then processes events until all
    /// handles are dropped.
    pub async fn run(mut self) {
        tracing::info!(echo_to_sender = self.echo_to_sender, "hub event loop started");
        let bridge = &self.bridge;
        with_retry("subscribe", BROADCAST_CHANNEL, move || {
            bridge.subscribe_broadcast()
        })
        .await;

        while let Some(event) = self.events.recv().await {
            self.handle(event).await;
        }

        tracing::info!(
            sessions = self.registry.len(),
            "hub event loop stopped, closing remaining sessions"
        );
    }

    /// Processes a single event.
    pub async fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register(session) => self.register(session).await,
            HubEvent::Unregister(id) => self.unregister(id).await,
            HubEvent::Submit { message, ack } => {
                let outcome = self.submit(message).await;
                // The submitter may have disconnected in the meantime.
                let _ = ack.send(outcome);
            }
            HubEvent::Deliver(envelope) => self.deliver(envelope).await,
            HubEvent::Announce(payload) => self.announce(payload).await,
            HubEvent::Stats(reply) => {
                let _ = reply.send(HubStats {
                    sessions: self.registry.len(),
                    users: self.registry.user_count(),
                });
            }
        }
    }

    async fn register(&mut self, session: SessionHandle) {
        let id = session.id();
        let user = session.user_id();
        let first_for_user = self.registry.insert(session);
        tracing::info!(
            session_id = %id,
            user_id = %user,
            sessions = self.registry.len(),
            "session registered"
        );

        if first_for_user {
            let bridge = &self.bridge;
            with_retry("subscribe", &user.to_string(), move || {
                bridge.subscribe_user(user)
            })
            .await;
        }
    }

    async fn unregister(&mut self, id: SessionId) {
        match self.registry.remove(id) {
            Some(removed) => self.release(removed, "unregistered").await,
            None => tracing::debug!(session_id = %id, "unregister for unknown session ignored"),
        }
    }

    /// Closes a removed session's queue and drops the user's bus
    /// subscription if it was their last session here.
    async fn release(&mut self, removed: Removed, reason: &str) {
        let Removed {
            handle,
            last_for_user,
        } = removed;
        let user = handle.user_id();
        tracing::info!(
            session_id = %handle.id(),
            user_id = %user,
            connected_at = %handle.connected_at(),
            sessions = self.registry.len(),
            reason,
            "session removed"
        );
        drop(handle);

        if last_for_user {
            let bridge = &self.bridge;
            with_retry("unsubscribe", &user.to_string(), move || {
                bridge.unsubscribe_user(user)
            })
            .await;
        }
    }

    /// Stores the message, resolves the conversation's members, and
    /// publishes one addressed envelope per recipient.
    async fn submit(&mut self, message: ChatMessage) -> Result<(), ChatError> {
        let conversation = message.conversation_id();
        let sender = message.sender_id();

        let message_id = self.store.save_message(&message).await.inspect_err(|e| {
            tracing::warn!(
                conversation_id = %conversation,
                sender_id = %sender,
                error = %e,
                "message not stored, fanout aborted"
            );
        })?;

        let members = self
            .store
            .conversation_members(conversation)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    conversation_id = %conversation,
                    message_id,
                    error = %e,
                    "membership lookup failed, fanout aborted"
                );
            })?;

        let payload = serde_json::to_string(&message.payload())
            .map_err(|e| ChatError::Internal(e.to_string()))?;
        let payload = Utf8Bytes::from(payload);

        for member in members {
            if member == sender && !self.echo_to_sender {
                continue;
            }
            self.publish(RoutedEnvelope::addressed(member, payload.clone()))
                .await;
        }
        Ok(())
    }

    async fn announce(&mut self, payload: Utf8Bytes) {
        self.publish(RoutedEnvelope::broadcast(payload)).await;
    }

    /// Publishes on the bus. Failures only cost live delivery; the stored
    /// copy is unaffected.
    async fn publish(&self, envelope: RoutedEnvelope) {
        if let Err(e) = self.bridge.publish(&envelope).await {
            tracing::warn!(
                channel = %envelope.channel(),
                error = %e,
                "bus publish failed, live delivery dropped"
            );
        }
    }

    async fn deliver(&mut self, envelope: RoutedEnvelope) {
        match envelope {
            RoutedEnvelope::Addressed { target, payload } => {
                self.deliver_to_user(target, payload).await;
            }
            RoutedEnvelope::Broadcast { payload } => {
                let stalled: Vec<(SessionId, &'static str)> = self
                    .registry
                    .handles()
                    .filter_map(|session| {
                        session
                            .try_send(payload.clone())
                            .err()
                            .map(|e| (session.id(), eviction_reason(&e)))
                    })
                    .collect();
                for (id, reason) in stalled {
                    self.evict(id, reason).await;
                }
            }
        }
    }

    async fn deliver_to_user(&mut self, target: UserId, payload: Utf8Bytes) {
        let Some(session) = self.registry.route(target) else {
            tracing::debug!(user_id = %target, "no local session for addressed envelope");
            return;
        };
        let id = session.id();
        if let Err(e) = session.try_send(payload) {
            self.evict(id, eviction_reason(&e)).await;
        }
    }

    /// Removes a session that could not accept a payload without blocking.
    async fn evict(&mut self, id: SessionId, reason: &str) {
        if let Some(removed) = self.registry.remove(id) {
            tracing::warn!(session_id = %id, reason, "evicting session");
            self.release(removed, reason).await;
        }
    }
}

fn eviction_reason(error: &TrySendError<Utf8Bytes>) -> &'static str {
    match error {
        TrySendError::Full(_) => "outbound queue full",
        TrySendError::Closed(_) => "outbound queue closed",
    }
}

/// Runs a bus subscription change, retrying with linear backoff.
async fn with_retry<F, Fut>(action: &str, target: &str, mut op: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ChatError>>,
{
    for attempt in 1..=SUBSCRIPTION_ATTEMPTS {
        match op().await {
            Ok(()) => return,
            Err(e) if attempt < SUBSCRIPTION_ATTEMPTS => {
                tracing::warn!(
                    action,
                    target,
                    attempt,
                    error = %e,
                    "bus subscription change failed, retrying"
                );
                tokio::time::sleep(SUBSCRIPTION_BACKOFF * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    action,
                    target,
                    attempts = SUBSCRIPTION_ATTEMPTS,
                    error = %e,
                    "bus subscription change failed, addressed delivery may be lost"
                );
            }
        }
    }
}
