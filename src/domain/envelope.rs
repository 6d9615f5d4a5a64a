//! Routed envelopes carried across the fanout bus.
//!
//! An envelope is either addressed to one user or broadcast to every
//! connected session. Its routing key is encoded in the bus channel name:
//! `user:{id}` for addressed delivery and [`BROADCAST_CHANNEL`] for
//! broadcast, so receivers never need to parse the payload to route it.

use axum::extract::ws::Utf8Bytes;

use super::UserId;

/// Well-known channel every instance listens on for broadcast traffic.
pub const BROADCAST_CHANNEL: &str = "chat:broadcast";

const USER_CHANNEL_PREFIX: &str = "user:";

/// Returns the bus channel that carries addressed traffic for `user`.
#[must_use]
pub fn user_channel(user: UserId) -> String {
    format!("{USER_CHANNEL_PREFIX}{user}")
}

/// Unit of delivery across the distributed bus.
///
/// The payload is the serialized JSON frame, ready to be written to a
/// socket as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedEnvelope {
    /// Deliver to every live session.
    Broadcast {
        /// Serialized frame.
        payload: Utf8Bytes,
    },
    /// Deliver to the live session of one user.
    Addressed {
        /// Recipient.
        target: UserId,
        /// Serialized frame.
        payload: Utf8Bytes,
    },
}

impl RoutedEnvelope {
    /// Creates an envelope addressed to `target`.
    #[must_use]
    pub fn addressed(target: UserId, payload: impl Into<Utf8Bytes>) -> Self {
        Self::Addressed {
            target,
            payload: payload.into(),
        }
    }

    /// Creates a broadcast envelope.
    #[must_use]
    pub fn broadcast(payload: impl Into<Utf8Bytes>) -> Self {
        Self::Broadcast {
            payload: payload.into(),
        }
    }

    /// Bus channel this envelope is published on.
    #[must_use]
    pub fn channel(&self) -> String {
        match self {
            Self::Broadcast { .. } => BROADCAST_CHANNEL.to_string(),
            Self::Addressed { target, .. } => user_channel(*target),
        }
    }

    /// Serialized frame.
    #[must_use]
    pub const fn payload(&self) -> &Utf8Bytes {
        match self {
            Self::Broadcast { payload } | Self::Addressed { payload, .. } => payload,
        }
    }

    #[cfg(test)]
    const fn target(&self) -> Option<UserId> {
        match self {
            Self::Broadcast { .. } => None,
            Self::Addressed { target, .. } => Some(*target),
        }
    }

    /// Rebuilds an envelope from a message received on `channel`.
    ///
    /// Returns `None` when the channel name is neither the broadcast
    /// channel nor a well-formed `user:{id}` channel.
    #[must_use]
    pub fn from_bus(channel: &str, payload: impl Into<Utf8Bytes>) -> Option<Self> {
        if channel == BROADCAST_CHANNEL {
            return Some(Self::broadcast(payload));
        }
        let target = channel
            .strip_prefix(USER_CHANNEL_PREFIX)?
            .parse::<i64>()
            .ok()?;
        Some(Self::addressed(UserId::new(target), payload))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn addressed_channel_is_per_user() {
        let env = RoutedEnvelope::addressed(UserId::new(42), "{}");
        assert_eq!(env.channel(), "user:42");
        assert_eq!(env.target(), Some(UserId::new(42)));
    }

    #[test]
    fn broadcast_uses_shared_channel() {
        let env = RoutedEnvelope::broadcast("{}");
        assert_eq!(env.channel(), BROADCAST_CHANNEL);
        assert_eq!(env.target(), None);
    }

    #[test]
    fn from_bus_decodes_target_from_channel() {
        let Some(env) = RoutedEnvelope::from_bus("user:9", "payload") else {
            panic!("user channel should decode");
        };
        assert_eq!(env.target(), Some(UserId::new(9)));
        assert_eq!(env.payload().as_str(), "payload");

        let Some(env) = RoutedEnvelope::from_bus(BROADCAST_CHANNEL, "all") else {
            panic!("broadcast channel should decode");
        };
        assert_eq!(env.target(), None);
    }

    #[test]
    fn from_bus_rejects_unknown_channels() {
        assert!(RoutedEnvelope::from_bus("general-chat", "x").is_none());
        assert!(RoutedEnvelope::from_bus("user:", "x").is_none());
        assert!(RoutedEnvelope::from_bus("user:abc", "x").is_none());
    }
}
