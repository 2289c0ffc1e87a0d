use chrono::{DateTime, Utc};
use courier_shared::api::session::SessionResponse;
use courier_shared::ids::{ConversationId, SessionId, UserId};

/// Double-ratchet session metadata. The ratchet state itself is an opaque
/// client blob the server never interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    pub id: SessionId,
    pub conversation_id: ConversationId,
    pub initiator_id: UserId,
    pub responder_id: UserId,
    pub ratchet_state: String,
    pub message_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(
        conversation_id: ConversationId,
        initiator_id: UserId,
        responder_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            conversation_id,
            initiator_id,
            responder_id,
            ratchet_state: String::new(),
            message_number: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user_id: UserId) -> bool {
        self.initiator_id == user_id || self.responder_id == user_id
    }
}

impl From<ConversationSession> for SessionResponse {
    fn from(s: ConversationSession) -> Self {
        SessionResponse {
            id: s.id,
            conversation_id: s.conversation_id,
            initiator_id: s.initiator_id,
            responder_id: s.responder_id,
            ratchet_state: s.ratchet_state,
            message_number: s.message_number,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Result of a conditional ratchet-state update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Updated(ConversationSession),
    /// The stored message number is ahead of the proposed one.
    Stale { current: i64 },
    NotFound,
}
