//! # chat-relay
//!
//! Multi-instance WebSocket chat relay.
//!
//! Clients hold a persistent WebSocket connection to any instance. Each
//! instance owns its connections through a single-owner hub event loop and
//! reaches sessions on other instances through a shared pub/sub bus with
//! one channel per user.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)          ├── Session reader / writer (ws/)
//!     │                                 │
//!     ├── UserService,                  ├── Hub event loop (hub/)
//!     │   ConversationService (service/)│      │
//!     │                                 │      ├── ChatStore (persistence/)
//!     └── PostgreSQL / in-memory ◀──────┘      └── FanoutBridge (bridge/)
//!                                                     │
//!                                          Redis pub/sub (user:{id}, chat:broadcast)
//! ```
//!
//! A submitted message is stored first, then published once per
//! conversation member on that member's bus channel. Every instance with a
//! live session for the member receives it and queues it on the session.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod persistence;
pub mod server;
pub mod service;
pub mod ws;
