//! REST endpoint handlers organized by resource.

pub mod announcements;
pub mod auth;
pub mod conversations;
pub mod system;
pub mod users;

use axum::Router;

use crate::app_state::AppState;

/// Composes all authenticated resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(users::routes())
        .merge(conversations::routes())
        .merge(announcements::routes())
}
