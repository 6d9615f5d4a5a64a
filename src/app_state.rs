//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenValidator;
use crate::config::SessionSettings;
use crate::hub::HubHandle;
use crate::service::{ConversationService, UserService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Front door to the hub event loop.
    pub hub: HubHandle,
    /// Account operations.
    pub users: Arc<UserService>,
    /// Conversation creation and history.
    pub conversations: Arc<ConversationService>,
    /// Validates access tokens for REST calls and WebSocket upgrades.
    pub tokens: Arc<dyn TokenValidator>,
    /// Limits and timers applied to every WebSocket session.
    pub session: SessionSettings,
}
