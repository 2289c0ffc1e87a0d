use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::ids::{ConversationId, MessageId, UserId};

use super::{corrupt, PgStore};
use crate::models::{Conversation, LastMessage, MessageBody, Participant, TypingPresence};
use crate::store::{ConversationStore, StoreError, StoreResult};

const CONVERSATION_COLUMNS: &str = "id, participant1_id, participant2_id, \
     participant1_unread, participant2_unread, \
     participant1_typing, participant1_typing_at, participant2_typing, participant2_typing_at, \
     participant1_hidden_at, participant2_hidden_at, \
     last_message_id, last_message_sender_id, last_message_content, \
     last_message_encrypted_content, last_message_iv, last_message_at, \
     created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: ConversationId,
    participant1_id: UserId,
    participant2_id: UserId,
    participant1_unread: i32,
    participant2_unread: i32,
    participant1_typing: bool,
    participant1_typing_at: Option<DateTime<Utc>>,
    participant2_typing: bool,
    participant2_typing_at: Option<DateTime<Utc>>,
    participant1_hidden_at: Option<DateTime<Utc>>,
    participant2_hidden_at: Option<DateTime<Utc>>,
    last_message_id: Option<MessageId>,
    last_message_sender_id: Option<UserId>,
    last_message_content: Option<String>,
    last_message_encrypted_content: Option<String>,
    last_message_iv: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = StoreError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let last_message = match (
            row.last_message_id,
            row.last_message_sender_id,
            row.last_message_at,
        ) {
            (Some(message_id), Some(sender_id), Some(sent_at)) => Some(LastMessage {
                message_id,
                sender_id,
                body: MessageBody::from_columns(
                    row.last_message_content.unwrap_or_default(),
                    row.last_message_encrypted_content,
                    row.last_message_iv,
                )
                .map_err(corrupt)?,
                sent_at,
            }),
            (None, None, None) => None,
            _ => return Err(corrupt(format!("conversation {} has a partial last message", row.id))),
        };
        Ok(Conversation {
            id: row.id,
            participants: [
                Participant {
                    user_id: row.participant1_id,
                    unread: i64::from(row.participant1_unread),
                    typing: TypingPresence {
                        active: row.participant1_typing,
                        signaled_at: row.participant1_typing_at,
                    },
                    hidden_at: row.participant1_hidden_at,
                },
                Participant {
                    user_id: row.participant2_id,
                    unread: i64::from(row.participant2_unread),
                    typing: TypingPresence {
                        active: row.participant2_typing,
                        signaled_at: row.participant2_typing_at,
                    },
                    hidden_at: row.participant2_hidden_at,
                },
            ],
            last_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn find_conversation_by_pair(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE LEAST(participant1_id, participant2_id) = LEAST($1::uuid, $2::uuid) \
               AND GREATEST(participant1_id, participant2_id) = GREATEST($1::uuid, $2::uuid)"
        ))
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Conversation::try_from).transpose()
    }

    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> StoreResult<Option<Conversation>> {
        let [first, second] = &conversation.participants;
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO conversations (id, participant1_id, participant2_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(conversation.id)
        .bind(first.user_id)
        .bind(second.user_id)
        .bind(conversation.created_at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Conversation::try_from).transpose()
    }

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Conversation::try_from).transpose()
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE last_message_at IS NOT NULL \
               AND ((participant1_id = $1 \
                     AND (participant1_hidden_at IS NULL OR last_message_at > participant1_hidden_at)) \
                 OR (participant2_id = $1 \
                     AND (participant2_hidden_at IS NULL OR last_message_at > participant2_hidden_at))) \
             ORDER BY last_message_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Conversation::try_from).collect()
    }

    async fn signal_typing(
        &self,
        id: ConversationId,
        user_id: UserId,
        is_typing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET \
               participant1_typing = CASE WHEN participant1_id = $2 THEN $3 ELSE participant1_typing END, \
               participant1_typing_at = CASE WHEN participant1_id = $2 AND $3 THEN $4 ELSE participant1_typing_at END, \
               participant2_typing = CASE WHEN participant2_id = $2 THEN $3 ELSE participant2_typing END, \
               participant2_typing_at = CASE WHEN participant2_id = $2 AND $3 THEN $4 ELSE participant2_typing_at END \
             WHERE id = $1 AND $2 IN (participant1_id, participant2_id)",
        )
        .bind(id)
        .bind(user_id)
        .bind(is_typing)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset_unread(&self, id: ConversationId, user_id: UserId) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET \
               participant1_unread = CASE WHEN participant1_id = $2 THEN 0 ELSE participant1_unread END, \
               participant2_unread = CASE WHEN participant2_id = $2 THEN 0 ELSE participant2_unread END \
             WHERE id = $1 AND $2 IN (participant1_id, participant2_id)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn total_unread(&self, user_id: UserId) -> StoreResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(CASE WHEN participant1_id = $1 \
                                      THEN participant1_unread ELSE participant2_unread END), 0)::BIGINT \
             FROM conversations WHERE $1 IN (participant1_id, participant2_id)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn hide_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE conversations SET \
               participant1_hidden_at = CASE WHEN participant1_id = $2 THEN $3 ELSE participant1_hidden_at END, \
               participant1_unread = CASE WHEN participant1_id = $2 THEN 0 ELSE participant1_unread END, \
               participant2_hidden_at = CASE WHEN participant2_id = $2 THEN $3 ELSE participant2_hidden_at END, \
               participant2_unread = CASE WHEN participant2_id = $2 THEN 0 ELSE participant2_unread END \
             WHERE id = $1 AND $2 IN (participant1_id, participant2_id)",
        )
        .bind(id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
