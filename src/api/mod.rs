//! REST API layer: route handlers, DTOs, OpenAPI document, and router
//! composition.
//!
//! Account routes (`/register`, `/login`) and `/health` sit at the root;
//! everything else is mounted under `/api/v1` and requires a bearer token.

pub mod docs;
pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::auth::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(docs::swagger_router());

    router
}
