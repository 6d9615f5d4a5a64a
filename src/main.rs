//! chat-relay server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use chat_relay::auth::JwtService;
use chat_relay::bridge::{BusStream, FanoutBus, LocalBus, RedisBus};
use chat_relay::config::{LogFormat, ServerConfig};
use chat_relay::persistence::{ChatStore, MemoryStore, PostgresStore, UserStore};
use chat_relay::server::{build_app, build_state, serve, start_runtime};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting chat-relay");

    // Build persistence layer
    let (chat_store, user_store): (Arc<dyn ChatStore>, Arc<dyn UserStore>) =
        if config.persistence_enabled {
            let store = PostgresStore::connect(&config)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("applying migrations")?;
            let store = Arc::new(store);
            (Arc::clone(&store) as Arc<dyn ChatStore>, store as Arc<dyn UserStore>)
        } else {
            tracing::warn!("persistence disabled, using in-memory store");
            let store = Arc::new(MemoryStore::new());
            (Arc::clone(&store) as Arc<dyn ChatStore>, store as Arc<dyn UserStore>)
        };

    // Build fanout bus
    let (bus, stream): (Arc<dyn FanoutBus>, BusStream) = match &config.redis_url {
        Some(url) => {
            let (bus, stream) = RedisBus::connect(url).await.context("connecting to redis")?;
            (Arc::new(bus) as Arc<dyn FanoutBus>, stream)
        }
        None => {
            tracing::warn!("REDIS_URL unset, using in-process bus (single instance only)");
            let (client, stream) = LocalBus::default().connect();
            (Arc::new(client) as Arc<dyn FanoutBus>, stream)
        }
    };

    // Start hub and bridge
    let runtime = start_runtime(Arc::clone(&chat_store), bus, stream, config.echo_to_sender);

    // Build application state
    let jwt = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_ttl_hours));
    let state = build_state(
        runtime.hub,
        chat_store,
        user_store,
        jwt,
        config.session,
        config.history_limit,
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    serve(listener, build_app(state), runtime.bridge_task, shutdown_signal())
        .await
        .context("serving")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
