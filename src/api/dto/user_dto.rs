//! User search and announcement payloads.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// Query string of `GET /api/v1/users/search`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SearchParams {
    /// Case-insensitive username fragment.
    #[serde(default)]
    pub q: String,
}

/// Body of `POST /api/v1/announcements`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnnouncementRequest {
    /// Text pushed to every connected session.
    pub content: String,
}
