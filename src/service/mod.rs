//! Service layer: business rules behind the REST handlers.
//!
//! [`UserService`] handles accounts and tokens; [`ConversationService`]
//! handles conversation creation and history. Chat traffic itself never
//! passes through here; it goes straight from the sessions to the hub.

pub mod conversation_service;
pub mod user_service;

pub use conversation_service::ConversationService;
pub use user_service::{LoginOutcome, UserService};
