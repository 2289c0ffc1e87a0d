use axum::extract::{Path, State};
use axum::Json;
use courier_shared::api::session::{
    SessionLookupResponse, SessionResponse, UpdateSessionStateRequest,
};
use courier_shared::ids::SessionId;

use crate::error::ServerError;
use crate::extractors::auth::AuthUser;
use crate::extractors::participant::ConversationParticipant;
use crate::state::AppState;

#[utoipa::path(post, path = "/api/conversations/{conversation_id}/session", tag = "Sessions", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 200, body = courier_shared::api::session::SessionResponse), (status = 403, body = crate::error::ErrorResponse)))]
/// POST /api/conversations/:conversation_id/session
/// Establish the conversation's session with the caller as initiator.
/// Returns the existing session if one is already there.
pub async fn create(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<Json<SessionResponse>, ServerError> {
    let responder = participant.other_user_id()?;
    let session = state
        .services
        .sessions
        .create_session(participant.conversation_id(), participant.user_id, responder)
        .await?;
    Ok(Json(session.into()))
}

#[utoipa::path(get, path = "/api/conversations/{conversation_id}/session", tag = "Sessions", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), responses((status = 200, body = courier_shared::api::session::SessionLookupResponse)))]
/// GET /api/conversations/:conversation_id/session
/// A missing session is reported as `established: false`, not 404.
pub async fn get(
    State(state): State<AppState>,
    participant: ConversationParticipant,
) -> Result<Json<SessionLookupResponse>, ServerError> {
    let session = state
        .services
        .sessions
        .session(participant.conversation_id(), participant.user_id)
        .await?;
    Ok(Json(SessionLookupResponse {
        established: session.is_some(),
        session: session.map(Into::into),
    }))
}

#[utoipa::path(put, path = "/api/sessions/{session_id}/state", tag = "Sessions", security(("bearer_auth" = [])), params(("session_id" = String, Path, description = "Session ID")), request_body = courier_shared::api::session::UpdateSessionStateRequest, responses((status = 200, body = courier_shared::api::session::SessionResponse), (status = 409, body = crate::error::ErrorResponse)))]
/// PUT /api/sessions/:session_id/state
/// Store the latest ratchet state. 409 when `message_number` is behind the
/// stored one.
pub async fn update_state(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<SessionId>,
    Json(body): Json<UpdateSessionStateRequest>,
) -> Result<Json<SessionResponse>, ServerError> {
    let session = state
        .services
        .sessions
        .update_state(
            session_id,
            auth.user_id,
            &body.ratchet_state,
            body.message_number,
        )
        .await?;
    Ok(Json(session.into()))
}
