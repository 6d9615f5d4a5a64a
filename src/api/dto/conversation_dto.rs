//! Conversation creation and history payloads.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{ConversationId, UserId};

/// Body of `POST /api/v1/conversations`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StartConversationRequest {
    /// The other participant.
    pub target_id: UserId,
}

/// Body of `POST /api/v1/conversations/group`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    /// Members besides the caller.
    pub member_ids: Vec<UserId>,
}

/// Identifier of a created or found conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    /// Conversation to submit messages to.
    pub conversation_id: ConversationId,
}

/// Query string of the history endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Page size; defaults to and is capped by `HISTORY_LIMIT`.
    pub limit: Option<u32>,
}
