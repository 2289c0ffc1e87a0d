use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use courier_shared::error::CourierError;
use courier_shared::ids::{ConversationId, UserId};

use crate::error::ServerError;
use crate::extractors::auth::AuthUser;
use crate::models::Conversation;
use crate::state::AppState;

/// The caller plus the conversation named by the `{conversation_id}` path
/// segment, resolved only if the caller takes part in it.
///
/// Unauthenticated callers get 401, unknown conversations 404 and
/// outsiders 403.
#[derive(Debug, Clone)]
pub struct ConversationParticipant {
    pub user_id: UserId,
    pub conversation: Conversation,
}

impl ConversationParticipant {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation.id
    }

    /// The participant on the other side of the conversation.
    pub fn other_user_id(&self) -> Result<UserId, ServerError> {
        self.conversation
            .other_participant(self.user_id)
            .map(|p| p.user_id)
            .ok_or(ServerError(CourierError::Forbidden))
    }
}

impl FromRequestParts<AppState> for ConversationParticipant {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state)
            .await
            .map_err(|_| ServerError(CourierError::Unauthorized))?;

        let Path(params): Path<HashMap<String, String>> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ServerError(CourierError::NotFound))?;

        let conversation_id: ConversationId = params
            .get("conversation_id")
            .ok_or(ServerError(CourierError::NotFound))?
            .parse()
            .map_err(|_| ServerError(CourierError::NotFound))?;

        let conversation = state
            .services
            .conversations
            .get_for_participant(conversation_id, auth.user_id)
            .await?;

        Ok(ConversationParticipant {
            user_id: auth.user_id,
            conversation,
        })
    }
}
