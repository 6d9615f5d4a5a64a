//! Cloneable front door to the hub loop.

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot};

use super::{HubEvent, HubStats, SessionHandle};
use crate::domain::{ChatMessage, ChatPayload, RoutedEnvelope, SessionId};
use crate::error::ChatError;

/// Sends events into the hub loop.
///
/// Every method only enqueues; the hub processes events one at a time in
/// arrival order. All methods fail with [`ChatError::HubUnavailable`] once
/// the loop has stopped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::UnboundedSender<HubEvent>,
}

impl HubHandle {
    pub(super) fn new(events: mpsc::UnboundedSender<HubEvent>) -> Self {
        Self { events }
    }

    fn send(&self, event: HubEvent) -> Result<(), ChatError> {
        self.events
            .send(event)
            .map_err(|_| ChatError::HubUnavailable)
    }

    /// Registers a freshly upgraded session.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HubUnavailable`] if the hub has stopped.
    pub fn register(&self, session: SessionHandle) -> Result<(), ChatError> {
        self.send(HubEvent::Register(session))
    }

    /// Deregisters a session. Unknown or already removed ids are ignored by
    /// the hub.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HubUnavailable`] if the hub has stopped.
    pub fn unregister(&self, id: SessionId) -> Result<(), ChatError> {
        self.send(HubEvent::Unregister(id))
    }

    /// Submits a client message and waits until it is stored and handed to
    /// the bus.
    ///
    /// # Errors
    ///
    /// Returns the persistence or membership error that aborted fanout, or
    /// [`ChatError::HubUnavailable`] if the hub has stopped.
    pub async fn submit(&self, message: ChatMessage) -> Result<(), ChatError> {
        let (ack, outcome) = oneshot::channel();
        self.send(HubEvent::Submit { message, ack })?;
        outcome.await.map_err(|_| ChatError::HubUnavailable)?
    }

    /// Hands an envelope received from the bus to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HubUnavailable`] if the hub has stopped.
    pub fn deliver(&self, envelope: RoutedEnvelope) -> Result<(), ChatError> {
        self.send(HubEvent::Deliver(envelope))
    }

    /// Broadcasts `payload` to every connected session on every instance.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Internal`] if the payload cannot be serialized
    /// and [`ChatError::HubUnavailable`] if the hub has stopped.
    pub fn announce(&self, payload: &ChatPayload) -> Result<(), ChatError> {
        let json = serde_json::to_string(payload).map_err(|e| ChatError::Internal(e.to_string()))?;
        self.send(HubEvent::Announce(Utf8Bytes::from(json)))
    }

    /// Returns a snapshot of the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::HubUnavailable`] if the hub has stopped.
    pub async fn stats(&self) -> Result<HubStats, ChatError> {
        let (reply, stats) = oneshot::channel();
        self.send(HubEvent::Stats(reply))?;
        stats.await.map_err(|_| ChatError::HubUnavailable)
    }
}
