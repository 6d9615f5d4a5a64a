//! Wiring helpers shared by the binary and the integration tests.

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::auth::JwtService;
use crate::bridge::{BusStream, FanoutBridge, FanoutBus, spawn_receive_loop};
use crate::config::SessionSettings;
use crate::error::ChatError;
use crate::hub::{Hub, HubHandle};
use crate::persistence::{ChatStore, UserStore};
use crate::service::{ConversationService, UserService};
use crate::ws::handler::ws_handler;

/// Background tasks of one relay instance.
#[derive(Debug)]
pub struct Runtime {
    /// Handle feeding the hub loop.
    pub hub: HubHandle,
    /// The hub event loop.
    pub hub_task: JoinHandle<()>,
    /// The bridge receive loop.
    pub bridge_task: JoinHandle<()>,
}

/// Spawns the hub event loop and the bridge receive loop.
///
/// `bus` and `stream` must come from the same bus connection so that the
/// subscriptions the hub opens govern what the receive loop sees.
#[must_use]
pub fn start_runtime(
    store: Arc<dyn ChatStore>,
    bus: Arc<dyn FanoutBus>,
    stream: BusStream,
    echo_to_sender: bool,
) -> Runtime {
    let (hub, handle) = Hub::new(store, FanoutBridge::new(bus), echo_to_sender);
    let hub_task = tokio::spawn(hub.run());
    let bridge_task = spawn_receive_loop(stream, handle.clone());
    Runtime {
        hub: handle,
        hub_task,
        bridge_task,
    }
}

/// Assembles the state shared by every handler.
#[must_use]
pub fn build_state(
    hub: HubHandle,
    chat: Arc<dyn ChatStore>,
    users: Arc<dyn UserStore>,
    jwt: Arc<JwtService>,
    session: SessionSettings,
    history_limit: u32,
) -> AppState {
    AppState {
        hub,
        users: Arc::new(UserService::new(users, Arc::clone(&jwt))),
        conversations: Arc::new(ConversationService::new(chat, history_limit)),
        tokens: jwt,
        session,
    }
}

/// Builds the full HTTP application: REST routes, `/ws`, tracing, and CORS.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves `app` until `shutdown` resolves, or fails if the bridge receive
/// loop stops first.
///
/// Without the receive loop the instance still accepts sessions and stores
/// messages, but nothing addressed to its users is ever delivered.
///
/// # Errors
///
/// Returns [`ChatError::Bus`] if `bridge_task` ends while serving, or
/// [`ChatError::Internal`] if the server itself fails.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    bridge_task: JoinHandle<()>,
    shutdown: F,
) -> Result<(), ChatError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();

    tokio::select! {
        served = server => served.map_err(|e| ChatError::Internal(e.to_string())),
        ended = bridge_task => {
            tracing::error!(
                panicked = ended.is_err(),
                "bridge receive loop stopped, shutting down"
            );
            Err(ChatError::Bus("bridge receive loop stopped".to_string()))
        }
    }
}
