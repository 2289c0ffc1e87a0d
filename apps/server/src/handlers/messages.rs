use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_shared::api::message::{
    EditHistoryResponse, EditMessageRequest, ForwardMessageRequest, MarkReadResponse,
    MessageHistoryQuery, MessageHistoryResponse, MessageListResponse, MessageResponse,
    MessageSearchQuery, SendMessageRequest, UpdateStatusRequest,
};
use courier_shared::ids::{MessageId, UserId};

use crate::error::ServerError;
use crate::extractors::auth::AuthUser;
use crate::extractors::participant::ConversationParticipant;
use crate::models::MessageView;
use crate::pagination::{decode_cursor, encode_cursor, history_limit, Page};
use crate::services::NewMessage;
use crate::state::AppState;

fn render(views: Vec<MessageView>, viewer: UserId) -> Vec<MessageResponse> {
    views.into_iter().map(|v| v.into_response(viewer)).collect()
}

// ─── Conversation-scoped ────────────────────────────────────

#[utoipa::path(post, path = "/api/conversations/{conversation_id}/messages", tag = "Messages", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), request_body = courier_shared::api::message::SendMessageRequest, responses((status = 201, body = courier_shared::api::message::MessageResponse), (status = 400, body = crate::error::ErrorResponse), (status = 403, body = crate::error::ErrorResponse)))]
/// POST /api/conversations/:conversation_id/messages
pub async fn send(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ServerError> {
    let new = NewMessage::from_request(body)?;
    let view = state
        .services
        .messages
        .create(participant.conversation_id(), participant.user_id, new)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(view.into_response(participant.user_id)),
    ))
}

#[utoipa::path(get, path = "/api/conversations/{conversation_id}/messages", tag = "Messages", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID"), courier_shared::api::message::MessageHistoryQuery), responses((status = 200, body = courier_shared::api::message::MessageHistoryResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// GET /api/conversations/:conversation_id/messages
/// Newest first. Pass `next_cursor` back as `cursor` for older messages.
pub async fn history(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Query(query): Query<MessageHistoryQuery>,
) -> Result<Json<MessageHistoryResponse>, ServerError> {
    let before = query.cursor.as_deref().map(decode_cursor).transpose()?;
    let page = state
        .services
        .messages
        .history(
            participant.conversation_id(),
            participant.user_id,
            before,
            history_limit(query.limit),
        )
        .await?;
    let next_cursor = page.next.map(|c| encode_cursor(c.created_at, c.id));
    Ok(Json(MessageHistoryResponse {
        has_more: next_cursor.is_some(),
        next_cursor,
        messages: render(page.messages, participant.user_id),
    }))
}

#[utoipa::path(post, path = "/api/conversations/{conversation_id}/messages/read", tag = "Messages", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 200, body = courier_shared::api::message::MarkReadResponse)))]
/// POST /api/conversations/:conversation_id/messages/read
/// Mark every message from the other participant as read.
pub async fn mark_all_read(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<Json<MarkReadResponse>, ServerError> {
    let updated = state
        .services
        .messages
        .mark_messages_as_read(participant.conversation_id(), participant.user_id)
        .await?;
    Ok(Json(MarkReadResponse { updated }))
}

#[utoipa::path(get, path = "/api/conversations/{conversation_id}/messages/pinned", tag = "Messages", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 200, body = courier_shared::api::message::MessageListResponse)))]
/// GET /api/conversations/:conversation_id/messages/pinned
pub async fn pinned(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<Json<MessageListResponse>, ServerError> {
    let views = state
        .services
        .messages
        .pinned(participant.conversation_id(), participant.user_id)
        .await?;
    Ok(Json(MessageListResponse {
        messages: render(views, participant.user_id),
    }))
}

#[utoipa::path(get, path = "/api/conversations/{conversation_id}/messages/search", tag = "Messages", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID"), courier_shared::api::message::MessageSearchQuery), responses((status = 200, body = courier_shared::api::message::MessageListResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// GET /api/conversations/:conversation_id/messages/search
/// Plaintext search within one conversation. Encrypted messages never match.
pub async fn search_in_conversation(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Query(query): Query<MessageSearchQuery>,
) -> Result<Json<MessageListResponse>, ServerError> {
    let views = state
        .services
        .messages
        .search_conversation(
            participant.conversation_id(),
            participant.user_id,
            &query.q,
            Page::new(query.limit, query.offset),
        )
        .await?;
    Ok(Json(MessageListResponse {
        messages: render(views, participant.user_id),
    }))
}

// ─── Message-scoped ─────────────────────────────────────────

#[utoipa::path(get, path = "/api/messages/search", tag = "Messages", security(("bearer_auth" = [])), params(courier_shared::api::message::MessageSearchQuery), responses((status = 200, body = courier_shared::api::message::MessageListResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// GET /api/messages/search
/// Plaintext search across all of the caller's conversations.
pub async fn search(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MessageSearchQuery>,
) -> Result<Json<MessageListResponse>, ServerError> {
    let views = state
        .services
        .messages
        .search(auth.user_id, &query.q, Page::new(query.limit, query.offset))
        .await?;
    Ok(Json(MessageListResponse {
        messages: render(views, auth.user_id),
    }))
}

#[utoipa::path(get, path = "/api/messages/{message_id}", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::message::MessageResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/messages/:message_id
pub async fn get_one(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<MessageResponse>, ServerError> {
    let view = state.services.messages.get(message_id, auth.user_id).await?;
    Ok(Json(view.into_response(auth.user_id)))
}

#[utoipa::path(patch, path = "/api/messages/{message_id}", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), request_body = courier_shared::api::message::EditMessageRequest, responses((status = 200, body = courier_shared::api::message::MessageResponse), (status = 403, body = crate::error::ErrorResponse)))]
/// PATCH /api/messages/:message_id
/// Replace the content. Sender only; the previous content goes to the edit
/// history.
pub async fn edit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<MessageResponse>, ServerError> {
    let view = state
        .services
        .messages
        .edit(message_id, auth.user_id, body)
        .await?;
    Ok(Json(view.into_response(auth.user_id)))
}

#[utoipa::path(delete, path = "/api/messages/{message_id}", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 204, description = "Hidden for the caller")))]
/// DELETE /api/messages/:message_id
/// Delete for the caller only.
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .messages
        .delete_for_user(message_id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(put, path = "/api/messages/{message_id}/status", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), request_body = courier_shared::api::message::UpdateStatusRequest, responses((status = 200, body = courier_shared::api::message::MessageResponse), (status = 403, body = crate::error::ErrorResponse)))]
/// PUT /api/messages/:message_id/status
/// Recipient only. A status lower than the current one is ignored.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>, ServerError> {
    let view = state
        .services
        .messages
        .update_status(message_id, auth.user_id, body.status)
        .await?;
    Ok(Json(view.into_response(auth.user_id)))
}

#[utoipa::path(get, path = "/api/messages/{message_id}/edits", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::message::EditHistoryResponse)))]
/// GET /api/messages/:message_id/edits
pub async fn edit_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<EditHistoryResponse>, ServerError> {
    let edits = state
        .services
        .messages
        .edit_history(message_id, auth.user_id)
        .await?;
    Ok(Json(EditHistoryResponse {
        message_id,
        edits: edits.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(put, path = "/api/messages/{message_id}/pin", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::message::MessageResponse)))]
/// PUT /api/messages/:message_id/pin
pub async fn pin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<MessageResponse>, ServerError> {
    let view = state.services.messages.pin(message_id, auth.user_id).await?;
    Ok(Json(view.into_response(auth.user_id)))
}

#[utoipa::path(delete, path = "/api/messages/{message_id}/pin", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::message::MessageResponse)))]
/// DELETE /api/messages/:message_id/pin
pub async fn unpin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<MessageResponse>, ServerError> {
    let view = state
        .services
        .messages
        .unpin(message_id, auth.user_id)
        .await?;
    Ok(Json(view.into_response(auth.user_id)))
}

#[utoipa::path(post, path = "/api/messages/{message_id}/forward", tag = "Messages", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), request_body = courier_shared::api::message::ForwardMessageRequest, responses((status = 201, body = courier_shared::api::message::MessageResponse), (status = 403, body = crate::error::ErrorResponse)))]
/// POST /api/messages/:message_id/forward
pub async fn forward(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
    Json(body): Json<ForwardMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ServerError> {
    let view = state
        .services
        .messages
        .forward(message_id, body.conversation_id, auth.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view.into_response(auth.user_id))))
}
