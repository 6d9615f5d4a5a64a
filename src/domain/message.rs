//! Chat messages and their wire representations.
//!
//! [`InboundFrame`] is what a client sends over its socket, [`ChatPayload`]
//! is what every recipient receives. [`ChatMessage`] sits between the two:
//! the immutable unit the hub persists and fans out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ConversationId, Identity, UserId};

/// Client → server chat submission.
///
/// ```json
/// { "conversation_id": 7, "content": "hi" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Message text.
    pub content: String,
}

/// Server → client chat payload.
///
/// ```json
/// { "conversation_id": 7, "username": "alice", "content": "hi", "sender_id": 1 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatPayload {
    /// Conversation the message belongs to (`0` for announcements).
    pub conversation_id: ConversationId,
    /// Sender display name.
    pub username: String,
    /// Message text.
    pub content: String,
    /// Sender user id.
    pub sender_id: UserId,
}

/// A message accepted from a client.
///
/// Immutable once constructed: the hub stores exactly this value and then
/// derives the outbound payload from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    sender: Identity,
    conversation_id: ConversationId,
    content: String,
    created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Stamps a new message from `sender` with the current time.
    #[must_use]
    pub fn new(sender: Identity, conversation_id: ConversationId, content: String) -> Self {
        Self {
            sender,
            conversation_id,
            content,
            created_at: Utc::now(),
        }
    }

    /// Builds a message from a decoded client frame.
    #[must_use]
    pub fn from_frame(sender: Identity, frame: InboundFrame) -> Self {
        Self::new(sender, frame.conversation_id, frame.content)
    }

    /// Sending user.
    #[must_use]
    pub const fn sender(&self) -> &Identity {
        &self.sender
    }

    /// Sending user's id.
    #[must_use]
    pub const fn sender_id(&self) -> UserId {
        self.sender.user_id
    }

    /// Target conversation.
    #[must_use]
    pub const fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Message text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Server-side creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Outbound payload delivered to every recipient.
    #[must_use]
    pub fn payload(&self) -> ChatPayload {
        ChatPayload {
            conversation_id: self.conversation_id,
            username: self.sender.username.clone(),
            content: self.content.clone(),
            sender_id: self.sender.user_id,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn inbound_frame_parses_wire_shape() {
        let raw = r#"{"conversation_id":7,"content":"hi"}"#;
        let Ok(frame) = serde_json::from_str::<InboundFrame>(raw) else {
            panic!("frame should parse");
        };
        assert_eq!(frame.conversation_id, ConversationId::new(7));
        assert_eq!(frame.content, "hi");
    }

    #[test]
    fn inbound_frame_rejects_missing_fields() {
        assert!(serde_json::from_str::<InboundFrame>(r#"{"content":"hi"}"#).is_err());
        assert!(serde_json::from_str::<InboundFrame>(r#"{"conversation_id":"x"}"#).is_err());
    }

    #[test]
    fn payload_carries_sender_fields() {
        let alice = Identity::new(UserId::new(1), "alice");
        let msg = ChatMessage::new(alice, ConversationId::new(7), "hi".to_string());
        let Ok(json) = serde_json::to_value(msg.payload()) else {
            panic!("serialization failed");
        };
        assert_eq!(
            json,
            serde_json::json!({
                "conversation_id": 7,
                "username": "alice",
                "content": "hi",
                "sender_id": 1,
            })
        );
    }
}
