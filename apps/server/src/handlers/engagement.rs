use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_shared::api::engagement::{
    AddReactionRequest, MessageReactionsResponse, ReactionToggleResponse, StarStatusResponse,
    ToggleAction,
};
use courier_shared::api::message::MessageListResponse;
use courier_shared::ids::{MessageId, ReactionId};

use crate::error::ServerError;
use crate::extractors::auth::AuthUser;
use crate::handlers::PageQuery;
use crate::models::{summarize_reactions, Toggle};
use crate::state::AppState;

// ─── Reactions ──────────────────────────────────────────────

#[utoipa::path(post, path = "/api/messages/{message_id}/reactions", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), request_body = courier_shared::api::engagement::AddReactionRequest, responses((status = 200, body = courier_shared::api::engagement::ReactionToggleResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// POST /api/messages/:message_id/reactions
/// Toggle: adds the reaction, or removes the caller's existing one.
pub async fn react(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
    Json(body): Json<AddReactionRequest>,
) -> Result<Json<ReactionToggleResponse>, ServerError> {
    let outcome = state
        .services
        .engagement
        .add_reaction(message_id, auth.user_id, &body.emoji)
        .await?;
    let response = match outcome {
        Toggle::Added(reaction) => ReactionToggleResponse {
            action: ToggleAction::Added,
            reaction: Some(reaction.into()),
        },
        Toggle::Removed(_) => ReactionToggleResponse {
            action: ToggleAction::Removed,
            reaction: None,
        },
    };
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/messages/{message_id}/reactions", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::engagement::MessageReactionsResponse)))]
/// GET /api/messages/:message_id/reactions
pub async fn list_reactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<MessageReactionsResponse>, ServerError> {
    let reactions = state
        .services
        .engagement
        .reactions(message_id, auth.user_id)
        .await?;
    Ok(Json(MessageReactionsResponse {
        message_id,
        summary: summarize_reactions(&reactions, auth.user_id),
        reactions: reactions.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(delete, path = "/api/messages/{message_id}/reactions", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 204, description = "Caller's reaction removed if present")))]
/// DELETE /api/messages/:message_id/reactions
pub async fn unreact(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .engagement
        .remove_user_reaction(message_id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(delete, path = "/api/reactions/{reaction_id}", tag = "Engagement", security(("bearer_auth" = [])), params(("reaction_id" = String, Path, description = "Reaction ID")), responses((status = 204, description = "Reaction removed if it was the caller's")))]
/// DELETE /api/reactions/:reaction_id
pub async fn delete_reaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reaction_id): Path<ReactionId>,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .engagement
        .remove_reaction(reaction_id, auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Stars ──────────────────────────────────────────────────

#[utoipa::path(get, path = "/api/messages/{message_id}/star", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::engagement::StarStatusResponse)))]
/// GET /api/messages/:message_id/star
pub async fn star_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<StarStatusResponse>, ServerError> {
    let starred = state
        .services
        .engagement
        .is_starred(message_id, auth.user_id)
        .await?;
    Ok(Json(StarStatusResponse {
        message_id,
        starred,
    }))
}

#[utoipa::path(put, path = "/api/messages/{message_id}/star", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::engagement::StarStatusResponse)))]
/// PUT /api/messages/:message_id/star
/// Idempotent; starring twice keeps one star.
pub async fn star(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<StarStatusResponse>, ServerError> {
    state
        .services
        .engagement
        .star(message_id, auth.user_id)
        .await?;
    Ok(Json(StarStatusResponse {
        message_id,
        starred: true,
    }))
}

#[utoipa::path(delete, path = "/api/messages/{message_id}/star", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::engagement::StarStatusResponse)))]
/// DELETE /api/messages/:message_id/star
pub async fn unstar(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<StarStatusResponse>, ServerError> {
    state
        .services
        .engagement
        .unstar(message_id, auth.user_id)
        .await?;
    Ok(Json(StarStatusResponse {
        message_id,
        starred: false,
    }))
}

#[utoipa::path(post, path = "/api/messages/{message_id}/star/toggle", tag = "Engagement", security(("bearer_auth" = [])), params(("message_id" = String, Path, description = "Message ID")), responses((status = 200, body = courier_shared::api::engagement::StarStatusResponse)))]
/// POST /api/messages/:message_id/star/toggle
pub async fn toggle_star(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<MessageId>,
) -> Result<Json<StarStatusResponse>, ServerError> {
    let outcome = state
        .services
        .engagement
        .toggle_star(message_id, auth.user_id)
        .await?;
    Ok(Json(StarStatusResponse {
        message_id,
        starred: outcome.is_added(),
    }))
}

#[utoipa::path(get, path = "/api/messages/starred", tag = "Engagement", security(("bearer_auth" = [])), params(crate::handlers::PageQuery), responses((status = 200, body = courier_shared::api::message::MessageListResponse)))]
/// GET /api/messages/starred
/// The caller's starred messages, most recently starred first.
pub async fn starred(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessageListResponse>, ServerError> {
    let views = state
        .services
        .engagement
        .starred_messages(auth.user_id, query.page())
        .await?;
    Ok(Json(MessageListResponse {
        messages: views
            .into_iter()
            .map(|v| v.into_response(auth.user_id))
            .collect(),
    }))
}
