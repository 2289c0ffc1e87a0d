use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_shared::api::conversation::{
    ConversationListQuery, ConversationListResponse, ConversationResponse,
    CreateConversationRequest, TypingRequest, UnreadCountResponse,
};

use crate::error::ServerError;
use crate::extractors::auth::AuthUser;
use crate::extractors::participant::ConversationParticipant;
use crate::pagination::Page;
use crate::state::AppState;

#[utoipa::path(post, path = "/api/conversations", tag = "Conversations", security(("bearer_auth" = [])), request_body = courier_shared::api::conversation::CreateConversationRequest, responses((status = 201, body = courier_shared::api::conversation::ConversationResponse), (status = 200, body = courier_shared::api::conversation::ConversationResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// POST /api/conversations
/// Open the conversation with another user. 201 when it was created by this
/// call, 200 when it already existed.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationResponse>), ServerError> {
    let svc = &state.services.conversations;
    let (conversation, created) = svc.get_or_create(auth.user_id, body.user_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(svc.view(&conversation, auth.user_id)?)))
}

#[utoipa::path(get, path = "/api/conversations", tag = "Conversations", security(("bearer_auth" = [])), params(courier_shared::api::conversation::ConversationListQuery), responses((status = 200, body = courier_shared::api::conversation::ConversationListResponse)))]
/// GET /api/conversations
/// The caller's conversations, most recently active first.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ConversationListQuery>,
) -> Result<Json<ConversationListResponse>, ServerError> {
    let conversations = state
        .services
        .conversations
        .list_for_user(auth.user_id, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(ConversationListResponse { conversations }))
}

#[utoipa::path(get, path = "/api/conversations/unread", tag = "Conversations", security(("bearer_auth" = [])), responses((status = 200, body = courier_shared::api::conversation::UnreadCountResponse)))]
/// GET /api/conversations/unread
/// Total unread messages across the caller's conversations.
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UnreadCountResponse>, ServerError> {
    let unread_count = state
        .services
        .conversations
        .unread_count(auth.user_id)
        .await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

#[utoipa::path(get, path = "/api/conversations/{conversation_id}", tag = "Conversations", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 200, body = courier_shared::api::conversation::ConversationResponse), (status = 403, body = crate::error::ErrorResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/conversations/:conversation_id
pub async fn get_one(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<Json<ConversationResponse>, ServerError> {
    let view = state
        .services
        .conversations
        .view(&participant.conversation, participant.user_id)?;
    Ok(Json(view))
}

#[utoipa::path(delete, path = "/api/conversations/{conversation_id}", tag = "Conversations", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 204, description = "Hidden for the caller"), (status = 403, body = crate::error::ErrorResponse)))]
/// DELETE /api/conversations/:conversation_id
/// Hide the conversation for the caller only. It reappears with the next
/// message.
pub async fn delete(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .conversations
        .delete_for_user(participant.conversation_id(), participant.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/conversations/{conversation_id}/typing", tag = "Conversations", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), request_body = courier_shared::api::conversation::TypingRequest, responses((status = 204, description = "Typing signal recorded")))]
/// POST /api/conversations/:conversation_id/typing
pub async fn typing(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Json(body): Json<TypingRequest>,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .conversations
        .update_typing(
            participant.conversation_id(),
            participant.user_id,
            body.is_typing,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/conversations/{conversation_id}/read", tag = "Conversations", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 204, description = "Unread counter cleared")))]
/// POST /api/conversations/:conversation_id/read
/// Reset the caller's unread counter. Message statuses are untouched.
pub async fn mark_read(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .conversations
        .mark_as_read(participant.conversation_id(), participant.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
