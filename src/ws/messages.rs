//! Inbound frame validation.
//!
//! Clients send exactly one shape, [`InboundFrame`]. Anything else is a
//! protocol violation and ends the session.

use crate::domain::InboundFrame;

/// Why an inbound frame was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// Text frame longer than the configured limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Received length in bytes.
        len: usize,
        /// Configured limit in bytes.
        max: usize,
    },
    /// Text frame that is not a valid chat submission.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Binary frames are not part of the protocol.
    #[error("binary frames are not accepted")]
    Binary,
}

/// Validates and decodes a client text frame.
///
/// # Errors
///
/// Returns [`ProtocolViolation::Oversized`] if `text` is longer than
/// `max_len` bytes and [`ProtocolViolation::Malformed`] if it is not a JSON
/// object of the form `{ "conversation_id": <int>, "content": <string> }`.
pub fn decode_inbound(text: &str, max_len: usize) -> Result<InboundFrame, ProtocolViolation> {
    if text.len() > max_len {
        return Err(ProtocolViolation::Oversized {
            len: text.len(),
            max: max_len,
        });
    }
    serde_json::from_str(text).map_err(|e| ProtocolViolation::Malformed(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ConversationId;

    #[test]
    fn accepts_chat_submission() {
        let Ok(frame) = decode_inbound(r#"{"conversation_id":7,"content":"hi"}"#, 512) else {
            panic!("frame should decode");
        };
        assert_eq!(frame.conversation_id, ConversationId::new(7));
        assert_eq!(frame.content, "hi");
    }

    #[test]
    fn rejects_oversized_before_parsing() {
        let text = format!(r#"{{"conversation_id":7,"content":"{}"}}"#, "x".repeat(600));
        assert!(matches!(
            decode_inbound(&text, 512),
            Err(ProtocolViolation::Oversized { max: 512, .. })
        ));
    }

    #[test]
    fn frame_at_exact_limit_is_accepted() {
        let prefix = r#"{"conversation_id":1,"content":""#;
        let padding = "y".repeat(512 - prefix.len() - 2);
        let text = format!("{prefix}{padding}\"}}");
        assert_eq!(text.len(), 512);
        assert!(decode_inbound(&text, 512).is_ok());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            decode_inbound("not json", 512),
            Err(ProtocolViolation::Malformed(_))
        ));
        assert!(matches!(
            decode_inbound(r#"{"content":"missing id"}"#, 512),
            Err(ProtocolViolation::Malformed(_))
        ));
    }
}
