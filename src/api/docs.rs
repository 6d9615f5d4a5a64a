//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    AnnouncementRequest, ConversationResponse, CreateGroupRequest, CredentialsRequest,
    LoginResponse, StartConversationRequest,
};
use super::handlers::{announcements, auth, conversations, system, users};
use crate::domain::{ChatPayload, ConversationId, UserId};
use crate::error::{ErrorBody, ErrorResponse};
use crate::hub::HubStats;
use crate::persistence::{StoredMessage, UserSummary};

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "chat-relay",
        description = "REST surface of the chat relay. Live traffic flows over the `/ws` WebSocket: clients send `{conversation_id, content}` and receive `{conversation_id, username, content, sender_id}`."
    ),
    paths(
        system::health_handler,
        auth::register,
        auth::login,
        users::search_users,
        conversations::start_private,
        conversations::create_group,
        conversations::history,
        announcements::announce,
    ),
    components(schemas(
        AnnouncementRequest,
        ChatPayload,
        ConversationId,
        ConversationResponse,
        CreateGroupRequest,
        CredentialsRequest,
        ErrorBody,
        ErrorResponse,
        HubStats,
        LoginResponse,
        StartConversationRequest,
        StoredMessage,
        UserId,
        UserSummary,
        system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Auth", description = "Registration and login"),
        (name = "Users", description = "User lookup"),
        (name = "Conversations", description = "Conversation management and history"),
        (name = "Announcements", description = "Broadcast notices"),
    )
)]
pub struct ApiDoc;

/// Swagger UI at `/swagger-ui`, serving the document at
/// `/api-docs/openapi.json`.
#[cfg(feature = "swagger-ui")]
pub fn swagger_router() -> axum::Router<crate::app_state::AppState> {
    axum::Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/register",
            "/login",
            "/api/v1/users/search",
            "/api/v1/conversations",
            "/api/v1/conversations/group",
            "/api/v1/conversations/{id}/messages",
            "/api/v1/announcements",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
