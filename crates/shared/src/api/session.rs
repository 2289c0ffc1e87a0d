use crate::ids::{ConversationId, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SessionResponse {
    pub id: SessionId,
    pub conversation_id: ConversationId,
    pub initiator_id: UserId,
    pub responder_id: UserId,
    /// Opaque base64 ratchet state; empty until the first ratchet step.
    pub ratchet_state: String,
    pub message_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lookup result. A missing session is reported, not treated as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SessionLookupResponse {
    pub established: bool,
    pub session: Option<SessionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UpdateSessionStateRequest {
    pub ratchet_state: String,
    pub message_number: i64,
}
