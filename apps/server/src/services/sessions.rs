use chrono::{DateTime, Utc};
use courier_shared::error::CourierError;
use courier_shared::ids::{ConversationId, SessionId, UserId};

use super::{ConversationService, ServiceContext};
use crate::models::{ConversationSession, SessionUpdate};
use crate::validation::validate_ratchet_state;

/// Double-ratchet session bookkeeping. At most one session per
/// conversation; the ratchet state is stored, never interpreted.
#[derive(Clone)]
pub struct SessionEstablisher {
    ctx: ServiceContext,
    conversations: ConversationService,
}

impl SessionEstablisher {
    pub fn new(ctx: ServiceContext, conversations: ConversationService) -> Self {
        Self { ctx, conversations }
    }

    /// Create the conversation's session, or return the one that already
    /// exists. Both users must be the conversation's participants.
    pub async fn create_session(
        &self,
        conversation_id: ConversationId,
        initiator: UserId,
        responder: UserId,
    ) -> Result<ConversationSession, CourierError> {
        let conversation = self
            .conversations
            .get_for_participant(conversation_id, initiator)
            .await?;
        let other = conversation
            .other_participant(initiator)
            .map(|p| p.user_id);
        if other != Some(responder) {
            return Err(CourierError::Validation(
                "responder must be the other participant".into(),
            ));
        }
        let candidate =
            ConversationSession::new(conversation_id, initiator, responder, self.ctx.now());
        let session = self
            .ctx
            .call(
                "create_session",
                self.ctx.store.create_session_if_absent(&candidate),
            )
            .await?;
        if session.id == candidate.id {
            tracing::info!(session_id = %session.id, %conversation_id, "session established");
        }
        Ok(session)
    }

    /// The conversation's session, if one was established.
    pub async fn session(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<Option<ConversationSession>, CourierError> {
        self.conversations
            .get_for_participant(conversation_id, viewer)
            .await?;
        self.ctx
            .call(
                "session_for_conversation",
                self.ctx.store.session_for_conversation(conversation_id),
            )
            .await
    }

    /// Replace the ratchet state. A lower message number than the stored
    /// one is a stale write and is rejected.
    pub async fn update_state(
        &self,
        session_id: SessionId,
        caller: UserId,
        ratchet_state: &str,
        message_number: i64,
    ) -> Result<ConversationSession, CourierError> {
        if message_number < 0 {
            return Err(CourierError::Validation(
                "message_number must not be negative".into(),
            ));
        }
        validate_ratchet_state(ratchet_state)?;

        let session = self
            .ctx
            .call("get_session", self.ctx.store.get_session(session_id))
            .await?
            .ok_or(CourierError::NotFound)?;
        if !session.involves(caller) {
            return Err(CourierError::Forbidden);
        }

        let outcome = self
            .ctx
            .call(
                "update_session_state",
                self.ctx.store.update_session_state(
                    session_id,
                    ratchet_state,
                    message_number,
                    self.ctx.now(),
                ),
            )
            .await?;
        match outcome {
            SessionUpdate::Updated(session) => Ok(session),
            SessionUpdate::Stale { current } => {
                tracing::warn!(%session_id, current, proposed = message_number, "stale session state rejected");
                Err(CourierError::Conflict("stale session state".into()))
            }
            SessionUpdate::NotFound => Err(CourierError::NotFound),
        }
    }

    /// Delete sessions not updated since `older_than`. Not bound by the
    /// request deadline.
    pub async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64, CourierError> {
        self.ctx
            .call_unbounded(
                "delete_sessions_idle_since",
                self.ctx.store.delete_sessions_idle_since(older_than),
            )
            .await
    }
}
