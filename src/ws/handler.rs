//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::session::run_session;
use crate::app_state::AppState;
use crate::auth::AuthUser;

/// `GET /ws`: Upgrade an authenticated HTTP connection to WebSocket.
///
/// Inbound frames and messages larger than the configured limit are refused
/// by the transport itself.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    let settings = state.session;
    tracing::debug!(user_id = %identity.user_id, "websocket upgrade accepted");

    ws.max_message_size(settings.max_message_size)
        .max_frame_size(settings.max_message_size)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_session(socket, identity, hub, settings))
}
