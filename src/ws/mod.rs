//! WebSocket layer: upgrade handler, session workers, frame validation.
//!
//! The endpoint at `/ws` upgrades an authenticated request and runs one
//! [`session`] per connection. Clients send
//! `{ "conversation_id": <int>, "content": <string> }` text frames and
//! receive chat payloads as text frames.

pub mod handler;
pub mod messages;
pub mod session;
