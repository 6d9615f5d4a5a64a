//! Connection registry owned by the hub event loop.
//!
//! [`Registry`] maps every live [`SessionId`] to its [`SessionHandle`] and
//! keeps a secondary index from [`UserId`] to that user's live sessions for
//! O(1) addressed delivery.
//!
//! # Concurrency
//!
//! The registry has no interior locking. It is owned by exactly one
//! [`super::Hub`] and mutated only from its event loop; nothing else can
//! reach it.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::domain::{Identity, SessionId, UserId};

/// Hub-side half of a live session.
///
/// Holds the only sender of the session's outbound queue; dropping the
/// handle closes the queue, which tells the session writer to send a close
/// frame and stop. Deliberately not `Clone`.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    identity: Identity,
    outbound: mpsc::Sender<Utf8Bytes>,
    connected_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Wraps the sending half of a session's outbound queue.
    #[must_use]
    pub fn new(id: SessionId, identity: Identity, outbound: mpsc::Sender<Utf8Bytes>) -> Self {
        Self {
            id,
            identity,
            outbound,
            connected_at: Utc::now(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    /// Time the session registered.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Non-blocking enqueue onto the outbound queue.
    ///
    /// # Errors
    ///
    /// Returns the payload back when the queue is full or closed.
    pub fn try_send(
        &self,
        payload: Utf8Bytes,
    ) -> Result<(), mpsc::error::TrySendError<Utf8Bytes>> {
        self.outbound.try_send(payload)
    }
}

/// Result of removing a session from the registry.
#[derive(Debug)]
pub struct Removed {
    /// The removed handle. Dropping it closes the session's queue.
    pub handle: SessionHandle,
    /// `true` when no other live session of the same user remains.
    pub last_for_user: bool,
}

/// Authoritative set of sessions connected to this instance.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<SessionId, SessionHandle>,
    /// Live sessions per user in registration order; the last one receives
    /// addressed delivery.
    by_user: HashMap<UserId, Vec<SessionId>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session, replacing any handle already stored under the
    /// same session id.
    ///
    /// Returns `true` if this is the user's first live session here, i.e.
    /// the caller should start listening for that user's bus channel.
    pub fn insert(&mut self, handle: SessionHandle) -> bool {
        let id = handle.id;
        let user = handle.user_id();
        if let Some(previous) = self.sessions.remove(&id) {
            self.detach(previous.user_id(), id);
        }
        let ids = self.by_user.entry(user).or_default();
        let first = ids.is_empty();
        ids.push(id);
        self.sessions.insert(id, handle);
        first
    }

    /// Removes a session. Returns `None` if it is not registered.
    pub fn remove(&mut self, id: SessionId) -> Option<Removed> {
        let handle = self.sessions.remove(&id)?;
        let last_for_user = self.detach(handle.user_id(), id);
        Some(Removed {
            handle,
            last_for_user,
        })
    }

    /// Drops `id` from the user index. Returns `true` if the user has no
    /// sessions left.
    fn detach(&mut self, user: UserId, id: SessionId) -> bool {
        let Some(ids) = self.by_user.get_mut(&user) else {
            return true;
        };
        ids.retain(|s| *s != id);
        if ids.is_empty() {
            self.by_user.remove(&user);
            true
        } else {
            false
        }
    }

    /// Session that receives addressed delivery for `user`: the most
    /// recently registered one still alive.
    #[must_use]
    pub fn route(&self, user: UserId) -> Option<&SessionHandle> {
        let id = self.by_user.get(&user)?.last()?;
        self.sessions.get(id)
    }

    #[cfg(test)]
    fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    #[cfg(test)]
    fn is_user_connected(&self, user: UserId) -> bool {
        self.by_user.contains_key(&user)
    }

    #[cfg(test)]
    fn sessions_for_user(&self, user: UserId) -> usize {
        self.by_user.get(&user).map_or(0, Vec::len)
    }

    /// Iterates over every registered session.
    pub fn handles(&self) -> impl Iterator<Item = &SessionHandle> {
        self.sessions.values()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Number of distinct users with at least one session.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Returns `true` if no session is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
