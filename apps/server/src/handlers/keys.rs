use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use courier_shared::api::keys::{
    ConversationKeyResponse, FingerprintResponse, IdentityKeyResponse, KeyBundleResponse,
    PreKeyCountResponse, RegisterIdentityKeyRequest, SignedPreKeyResponse,
    StoreConversationKeyRequest, UploadPreKeysRequest, UploadPreKeysResponse,
    UploadSignedPreKeyRequest,
};
use courier_shared::ids::{ConversationId, UserId};
use serde::Deserialize;

use crate::error::ServerError;
use crate::extractors::auth::AuthUser;
use crate::extractors::participant::ConversationParticipant;
use crate::state::AppState;

// ─── Identity keys ──────────────────────────────────────────

#[utoipa::path(put, path = "/api/keys/identity", tag = "Keys", security(("bearer_auth" = [])), request_body = courier_shared::api::keys::RegisterIdentityKeyRequest, responses((status = 200, body = courier_shared::api::keys::IdentityKeyResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// PUT /api/keys/identity
/// Register or replace the caller's identity public key.
pub async fn register_identity(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RegisterIdentityKeyRequest>,
) -> Result<Json<IdentityKeyResponse>, ServerError> {
    let key = state
        .services
        .keys
        .register_identity_key(auth.user_id, &body.public_key)
        .await?;
    Ok(Json(key.into()))
}

#[utoipa::path(get, path = "/api/keys/identity/{user_id}", tag = "Keys", security(("bearer_auth" = [])), params(("user_id" = String, Path, description = "User ID")), responses((status = 200, body = courier_shared::api::keys::IdentityKeyResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/keys/identity/:user_id
pub async fn get_identity(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<IdentityKeyResponse>, ServerError> {
    let key = state.services.keys.identity_key(user_id).await?;
    Ok(Json(key.into()))
}

#[utoipa::path(get, path = "/api/keys/fingerprint/{user_id}", tag = "Keys", security(("bearer_auth" = [])), params(("user_id" = String, Path, description = "User ID")), responses((status = 200, body = courier_shared::api::keys::FingerprintResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/keys/fingerprint/:user_id
/// Displayable safety number for out-of-band identity verification.
pub async fn fingerprint(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<FingerprintResponse>, ServerError> {
    let fingerprint = state.services.keys.fingerprint(user_id).await?;
    Ok(Json(FingerprintResponse {
        user_id,
        fingerprint,
    }))
}

// ─── Pre-keys ───────────────────────────────────────────────

#[utoipa::path(post, path = "/api/keys/prekeys", tag = "Keys", security(("bearer_auth" = [])), request_body = courier_shared::api::keys::UploadPreKeysRequest, responses((status = 200, body = courier_shared::api::keys::UploadPreKeysResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// POST /api/keys/prekeys
/// Upload 1..=100 one-time pre-keys for the caller.
pub async fn upload_pre_keys(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UploadPreKeysRequest>,
) -> Result<Json<UploadPreKeysResponse>, ServerError> {
    let (accepted, stock) = state
        .services
        .keys
        .upload_pre_keys(auth.user_id, &body.pre_keys)
        .await?;
    Ok(Json(UploadPreKeysResponse {
        accepted,
        available: stock.available,
    }))
}

#[utoipa::path(get, path = "/api/keys/prekeys/count", tag = "Keys", security(("bearer_auth" = [])), responses((status = 200, body = courier_shared::api::keys::PreKeyCountResponse)))]
/// GET /api/keys/prekeys/count
pub async fn pre_key_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PreKeyCountResponse>, ServerError> {
    let stock = state
        .services
        .keys
        .available_pre_keys(auth.user_id)
        .await?;
    Ok(Json(PreKeyCountResponse {
        available: stock.available,
        needs_replenish: stock.needs_replenish(),
    }))
}

#[utoipa::path(put, path = "/api/keys/signed-prekey", tag = "Keys", security(("bearer_auth" = [])), request_body = courier_shared::api::keys::UploadSignedPreKeyRequest, responses((status = 200, body = courier_shared::api::keys::SignedPreKeyResponse), (status = 400, body = crate::error::ErrorResponse)))]
/// PUT /api/keys/signed-prekey
/// Rotate the caller's signed pre-key. The signature is stored as given.
pub async fn upload_signed_pre_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UploadSignedPreKeyRequest>,
) -> Result<Json<SignedPreKeyResponse>, ServerError> {
    let key = state
        .services
        .keys
        .upload_signed_pre_key(auth.user_id, body.key_id, &body.public_key, &body.signature)
        .await?;
    Ok(Json(key.into()))
}

#[utoipa::path(get, path = "/api/keys/signed-prekey/{user_id}", tag = "Keys", security(("bearer_auth" = [])), params(("user_id" = String, Path, description = "User ID")), responses((status = 200, body = courier_shared::api::keys::SignedPreKeyResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/keys/signed-prekey/:user_id
pub async fn get_signed_pre_key(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<SignedPreKeyResponse>, ServerError> {
    let key = state.services.keys.signed_pre_key(user_id).await?;
    Ok(Json(key.into()))
}

#[utoipa::path(get, path = "/api/keys/signed-prekey/{user_id}/{key_id}", tag = "Keys", security(("bearer_auth" = [])), params(("user_id" = String, Path, description = "User ID"), ("key_id" = u32, Path, description = "Signed pre-key ID")), responses((status = 200, body = courier_shared::api::keys::SignedPreKeyResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/keys/signed-prekey/:user_id/:key_id
/// Also resolves recently retired keys.
pub async fn get_signed_pre_key_by_id(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((user_id, key_id)): Path<(UserId, u32)>,
) -> Result<Json<SignedPreKeyResponse>, ServerError> {
    let key = state
        .services
        .keys
        .signed_pre_key_by_id(user_id, key_id)
        .await?;
    Ok(Json(key.into()))
}

#[utoipa::path(get, path = "/api/keys/bundle/{user_id}", tag = "Keys", security(("bearer_auth" = [])), params(("user_id" = String, Path, description = "User ID")), responses((status = 200, body = courier_shared::api::keys::KeyBundleResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/keys/bundle/:user_id
/// Consumes one of the target's one-time pre-keys when any are left.
pub async fn bundle(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<KeyBundleResponse>, ServerError> {
    let bundle = state.services.keys.key_bundle(user_id).await?;
    Ok(Json(KeyBundleResponse {
        user_id,
        identity_key: bundle.identity_key.public_key,
        signed_pre_key: bundle.signed_pre_key.into(),
        one_time_pre_key: bundle.one_time_pre_key.map(Into::into),
    }))
}

// ─── Conversation keys ──────────────────────────────────────

#[utoipa::path(put, path = "/api/conversations/{conversation_id}/keys", tag = "Keys", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID")), request_body = courier_shared::api::keys::StoreConversationKeyRequest, responses((status = 200, body = courier_shared::api::keys::ConversationKeyResponse), (status = 403, body = crate::error::ErrorResponse)))]
/// PUT /api/conversations/:conversation_id/keys
/// Store the caller's public key for this conversation at `version`.
pub async fn store_conversation_key(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Json(body): Json<StoreConversationKeyRequest>,
) -> Result<Json<ConversationKeyResponse>, ServerError> {
    let key = state
        .services
        .keys
        .store_conversation_key(
            participant.conversation_id(),
            participant.user_id,
            &body.public_key,
            body.version,
        )
        .await?;
    Ok(Json(key.into()))
}

#[utoipa::path(get, path = "/api/conversations/{conversation_id}/keys/{user_id}", tag = "Keys", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID"), ("user_id" = String, Path, description = "Key owner")), responses((status = 200, body = courier_shared::api::keys::ConversationKeyResponse), (status = 404, body = crate::error::ErrorResponse)))]
/// GET /api/conversations/:conversation_id/keys/:user_id
/// Highest unrevoked version of a participant's conversation key.
pub async fn get_conversation_key(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Path((_, owner)): Path<(ConversationId, UserId)>,
) -> Result<Json<ConversationKeyResponse>, ServerError> {
    let key = state
        .services
        .keys
        .conversation_key(participant.conversation_id(), owner)
        .await?;
    Ok(Json(key.into()))
}

/// Which key version to revoke.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct RevokeKeyQuery {
    pub version: i32,
}

#[utoipa::path(delete, path = "/api/conversations/{conversation_id}/keys", tag = "Keys", security(("bearer_auth" = [])), params(("conversation_id" = String, Path, description = "Conversation ID"), RevokeKeyQuery), responses((status = 204, description = "Key version revoked"), (status = 404, body = crate::error::ErrorResponse)))]
/// DELETE /api/conversations/:conversation_id/keys?version=N
/// Revoke one of the caller's own key versions.
pub async fn revoke_conversation_key(
    State(state): State<AppState>,
    participant: ConversationParticipant,
    Query(query): Query<RevokeKeyQuery>,
) -> Result<StatusCode, ServerError> {
    state
        .services
        .keys
        .revoke_conversation_key(
            participant.conversation_id(),
            participant.user_id,
            query.version,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
