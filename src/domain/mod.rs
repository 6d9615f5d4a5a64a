//! Domain layer: identifiers, identities, messages, and routed envelopes.
//!
//! These types are shared by every other layer. They carry no I/O and no
//! shared state.

pub mod envelope;
pub mod identity;
pub mod ids;
pub mod message;

pub use envelope::{BROADCAST_CHANNEL, RoutedEnvelope, user_channel};
pub use identity::Identity;
pub use ids::{ConversationId, SessionId, UserId};
pub use message::{ChatMessage, ChatPayload, InboundFrame};
