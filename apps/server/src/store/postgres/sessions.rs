use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::ids::{ConversationId, SessionId, UserId};

use super::{corrupt, PgStore};
use crate::models::{ConversationSession, SessionUpdate};
use crate::store::{SessionStore, StoreResult};

const SESSION_COLUMNS: &str = "id, conversation_id, initiator_id, responder_id, \
     ratchet_state, message_number, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: SessionId,
    conversation_id: ConversationId,
    initiator_id: UserId,
    responder_id: UserId,
    ratchet_state: String,
    message_number: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for ConversationSession {
    fn from(row: SessionRow) -> Self {
        ConversationSession {
            id: row.id,
            conversation_id: row.conversation_id,
            initiator_id: row.initiator_id,
            responder_id: row.responder_id,
            ratchet_state: row.ratchet_state,
            message_number: row.message_number,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session_if_absent(
        &self,
        session: &ConversationSession,
    ) -> StoreResult<ConversationSession> {
        // The existing row can be deleted by cleanup between the insert and
        // the read; one retry then inserts ours.
        for _ in 0..2 {
            sqlx::query(
                "INSERT INTO conversation_sessions (id, conversation_id, initiator_id, \
                   responder_id, ratchet_state, message_number, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
                 ON CONFLICT (conversation_id) DO NOTHING",
            )
            .bind(session.id)
            .bind(session.conversation_id)
            .bind(session.initiator_id)
            .bind(session.responder_id)
            .bind(&session.ratchet_state)
            .bind(session.message_number)
            .bind(session.created_at)
            .execute(&self.pool)
            .await?;

            if let Some(existing) = self.session_for_conversation(session.conversation_id).await? {
                return Ok(existing);
            }
        }
        Err(corrupt(format!(
            "session for conversation {} vanished after insert",
            session.conversation_id
        )))
    }

    async fn get_session(&self, id: SessionId) -> StoreResult<Option<ConversationSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM conversation_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ConversationSession::from))
    }

    async fn session_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreResult<Option<ConversationSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM conversation_sessions WHERE conversation_id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ConversationSession::from))
    }

    async fn update_session_state(
        &self,
        id: SessionId,
        ratchet_state: &str,
        message_number: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<SessionUpdate> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE conversation_sessions \
             SET ratchet_state = $2, message_number = $3, updated_at = $4 \
             WHERE id = $1 AND message_number <= $3 \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(ratchet_state)
        .bind(message_number)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return Ok(SessionUpdate::Updated(row.into()));
        }

        let current: Option<i64> =
            sqlx::query_scalar("SELECT message_number FROM conversation_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(match current {
            Some(current) => SessionUpdate::Stale { current },
            None => SessionUpdate::NotFound,
        })
    }

    async fn delete_sessions_idle_since(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM conversation_sessions WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
