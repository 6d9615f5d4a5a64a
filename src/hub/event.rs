//! Events processed by the hub loop.

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::oneshot;
use utoipa::ToSchema;

use super::SessionHandle;
use crate::domain::{ChatMessage, RoutedEnvelope, SessionId};
use crate::error::ChatError;

/// One unit of work for the hub. Every registry mutation and every
/// delivery decision arrives as one of these, in a single total order.
#[derive(Debug)]
pub enum HubEvent {
    /// A session finished its upgrade and wants to receive traffic.
    Register(SessionHandle),
    /// A session's reader or writer terminated.
    Unregister(SessionId),
    /// A client submitted a message. The acknowledgement reports
    /// persistence and membership failures back to the submitting session.
    Submit {
        /// Message to store and fan out.
        message: ChatMessage,
        /// Receives the outcome once the message is stored and published.
        ack: oneshot::Sender<Result<(), ChatError>>,
    },
    /// The bridge received an envelope from the bus.
    Deliver(RoutedEnvelope),
    /// Publish a payload to every session on every instance.
    Announce(Utf8Bytes),
    /// Read-only snapshot request.
    Stats(oneshot::Sender<HubStats>),
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HubStats {
    /// Live sessions on this instance.
    pub sessions: usize,
    /// Distinct users with at least one live session.
    pub users: usize,
}
