use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::api::message::{Attachment, MessageStatus, MessageType};
use courier_shared::ids::{ConversationId, MessageId, UserId};

use super::{corrupt, PgStore};
use crate::models::{
    EditState, Message, MessageBody, MessageEditRecord, MessageKind, Pin,
};
use crate::store::{HistoryCursor, MessageStore, SearchScope, StoreError, StoreResult};
use crate::validation::escape_ilike;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, encrypted_content, iv, \
     message_type, attachment_url, attachment_name, attachment_mime_type, attachment_size, \
     status, delivered_at, read_at, reply_to_id, pinned_at, pinned_by, \
     edit_count, original_content, original_encrypted_content, original_iv, edited_at, \
     forwarded_from_id, created_at, updated_at";

/// Excludes rows the viewer (bound as `$2`) deleted for themselves.
const NOT_HIDDEN: &str = "NOT EXISTS (SELECT 1 FROM message_deletions d \
     WHERE d.message_id = messages.id AND d.user_id = $2)";

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: MessageId,
    conversation_id: ConversationId,
    sender_id: UserId,
    content: String,
    encrypted_content: Option<String>,
    iv: Option<String>,
    message_type: String,
    attachment_url: Option<String>,
    attachment_name: Option<String>,
    attachment_mime_type: Option<String>,
    attachment_size: Option<i64>,
    status: i16,
    delivered_at: Option<DateTime<Utc>>,
    read_at: Option<DateTime<Utc>>,
    reply_to_id: Option<MessageId>,
    pinned_at: Option<DateTime<Utc>>,
    pinned_by: Option<UserId>,
    edit_count: i32,
    original_content: Option<String>,
    original_encrypted_content: Option<String>,
    original_iv: Option<String>,
    edited_at: Option<DateTime<Utc>>,
    forwarded_from_id: Option<MessageId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let status = MessageStatus::from_rank(row.status)
            .ok_or_else(|| corrupt(format!("message {} has status rank {}", row.id, row.status)))?;
        let message_type = MessageType::parse(&row.message_type).ok_or_else(|| {
            corrupt(format!("message {} has type {:?}", row.id, row.message_type))
        })?;
        let attachment = row.attachment_url.map(|url| Attachment {
            url,
            file_name: row.attachment_name,
            mime_type: row.attachment_mime_type,
            size_bytes: row.attachment_size,
        });
        let kind = MessageKind::from_parts(message_type, attachment)
            .map_err(|e| corrupt(format!("message {}: {e}", row.id)))?;
        let body = MessageBody::from_columns(row.content, row.encrypted_content, row.iv)
            .map_err(corrupt)?;
        let original = row
            .original_content
            .map(|content| {
                MessageBody::from_columns(content, row.original_encrypted_content, row.original_iv)
            })
            .transpose()
            .map_err(corrupt)?;
        let pin = match (row.pinned_by, row.pinned_at) {
            (Some(pinned_by), Some(pinned_at)) => Some(Pin {
                pinned_by,
                pinned_at,
            }),
            _ => None,
        };
        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            body,
            kind,
            status,
            delivered_at: row.delivered_at,
            read_at: row.read_at,
            reply_to_id: row.reply_to_id,
            pin,
            edit: EditState {
                count: row.edit_count,
                original,
                edited_at: row.edited_at,
            },
            forwarded_from_id: row.forwarded_from_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EditRow {
    message_id: MessageId,
    previous_content: String,
    previous_encrypted_content: Option<String>,
    previous_iv: Option<String>,
    edited_by: UserId,
    edited_at: DateTime<Utc>,
}

impl TryFrom<EditRow> for MessageEditRecord {
    type Error = StoreError;

    fn try_from(row: EditRow) -> Result<Self, Self::Error> {
        Ok(MessageEditRecord {
            message_id: row.message_id,
            previous: MessageBody::from_columns(
                row.previous_content,
                row.previous_encrypted_content,
                row.previous_iv,
            )
            .map_err(corrupt)?,
            edited_by: row.edited_by,
            edited_at: row.edited_at,
        })
    }
}

fn into_messages(rows: Vec<MessageRow>) -> StoreResult<Vec<Message>> {
    rows.into_iter().map(Message::try_from).collect()
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append_message(&self, message: &Message, recipient: UserId) -> StoreResult<()> {
        let attachment = message.kind.attachment();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, content, encrypted_content, iv, \
               message_type, attachment_url, attachment_name, attachment_mime_type, attachment_size, \
               status, reply_to_id, forwarded_from_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.body.content())
        .bind(message.body.encrypted_content())
        .bind(message.body.iv())
        .bind(message.kind.message_type().as_str())
        .bind(attachment.map(|a| a.url.as_str()))
        .bind(attachment.and_then(|a| a.file_name.as_deref()))
        .bind(attachment.and_then(|a| a.mime_type.as_deref()))
        .bind(attachment.and_then(|a| a.size_bytes))
        .bind(message.status.rank())
        .bind(message.reply_to_id)
        .bind(message.forwarded_from_id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET \
               participant1_unread = participant1_unread + CASE WHEN participant1_id = $2 THEN 1 ELSE 0 END, \
               participant2_unread = participant2_unread + CASE WHEN participant2_id = $2 THEN 1 ELSE 0 END \
             WHERE id = $1",
        )
        .bind(message.conversation_id)
        .bind(recipient)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE conversations SET \
               last_message_id = $2, last_message_sender_id = $3, last_message_content = $4, \
               last_message_encrypted_content = $5, last_message_iv = $6, \
               last_message_at = $7, updated_at = $7 \
             WHERE id = $1 AND (last_message_at IS NULL OR last_message_at <= $7)",
        )
        .bind(message.conversation_id)
        .bind(message.id)
        .bind(message.sender_id)
        .bind(message.body.content())
        .bind(message.body.encrypted_content())
        .bind(message.body.iv())
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Message::try_from).transpose()
    }

    async fn get_messages(&self, ids: &[MessageId]) -> StoreResult<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<uuid::Uuid> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(&self.pool)
        .await?;
        into_messages(rows)
    }

    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        sqlx::query(
            "UPDATE messages SET status = $2, \
               delivered_at = COALESCE(delivered_at, $3), \
               read_at = CASE WHEN $2 = 2 THEN $3 ELSE read_at END, \
               updated_at = $3 \
             WHERE id = $1 AND status < $2",
        )
        .bind(id)
        .bind(status.rank())
        .bind(at)
        .execute(&self.pool)
        .await?;
        self.get_message(id).await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET status = $3, \
               delivered_at = COALESCE(delivered_at, $4), read_at = $4, updated_at = $4 \
             WHERE conversation_id = $1 AND sender_id <> $2 AND status < $3",
        )
        .bind(conversation_id)
        .bind(reader)
        .bind(MessageStatus::Read.rank())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn edit_message(
        &self,
        id: MessageId,
        body: &MessageBody,
        edited_by: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut message = Message::try_from(row)?;
        let record = message.apply_edit(body.clone(), edited_by, at);

        sqlx::query(
            "INSERT INTO message_edit_history (id, message_id, previous_content, \
               previous_encrypted_content, previous_iv, edited_by, edited_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(uuid::Uuid::now_v7())
        .bind(record.message_id)
        .bind(record.previous.content())
        .bind(record.previous.encrypted_content())
        .bind(record.previous.iv())
        .bind(record.edited_by)
        .bind(record.edited_at)
        .execute(&mut *tx)
        .await?;

        let original = message.edit.original.as_ref();
        sqlx::query(
            "UPDATE messages SET content = $2, encrypted_content = $3, iv = $4, \
               edit_count = $5, original_content = $6, original_encrypted_content = $7, \
               original_iv = $8, edited_at = $9, updated_at = $9 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(message.body.content())
        .bind(message.body.encrypted_content())
        .bind(message.body.iv())
        .bind(message.edit.count)
        .bind(original.map(MessageBody::content))
        .bind(original.and_then(MessageBody::encrypted_content))
        .bind(original.and_then(MessageBody::iv))
        .bind(at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(message))
    }

    async fn edit_history(&self, id: MessageId) -> StoreResult<Vec<MessageEditRecord>> {
        let rows = sqlx::query_as::<_, EditRow>(
            "SELECT message_id, previous_content, previous_encrypted_content, previous_iv, \
               edited_by, edited_at \
             FROM message_edit_history WHERE message_id = $1 ORDER BY edited_at, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(MessageEditRecord::try_from).collect()
    }

    async fn set_pin(
        &self,
        id: MessageId,
        pin: Option<Pin>,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE messages SET pinned_by = $2, pinned_at = $3, updated_at = $4 \
             WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(pin.map(|p| p.pinned_by))
        .bind(pin.map(|p| p.pinned_at))
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Message::try_from).transpose()
    }

    async fn hide_message(
        &self,
        id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO message_deletions (message_id, user_id, deleted_at) VALUES ($1, $2, $3) \
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_message_hidden(&self, id: MessageId, user_id: UserId) -> StoreResult<bool> {
        let hidden: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM message_deletions WHERE message_id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(hidden)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 AND {NOT_HIDDEN} \
               AND ($3::timestamptz IS NULL OR (created_at, id) < ($3, $4::uuid)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5"
        ))
        .bind(conversation_id)
        .bind(viewer)
        .bind(before.map(|c| c.created_at))
        .bind(before.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_messages(rows)
    }

    async fn list_pinned(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 AND pinned_at IS NOT NULL AND {NOT_HIDDEN} \
             ORDER BY pinned_at DESC, id DESC"
        ))
        .bind(conversation_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;
        into_messages(rows)
    }

    async fn search_messages(
        &self,
        scope: SearchScope,
        viewer: UserId,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>> {
        let conversation = match scope {
            SearchScope::Conversation(id) => Some(id),
            SearchScope::AllConversations => None,
        };
        let pattern = format!("%{}%", escape_ilike(query));
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE encrypted_content IS NULL AND content ILIKE $3 \
               AND {NOT_HIDDEN} \
               AND conversation_id IN ( \
                 SELECT id FROM conversations \
                 WHERE $2 IN (participant1_id, participant2_id) \
                   AND ($1::uuid IS NULL OR id = $1)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(conversation)
        .bind(viewer)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        into_messages(rows)
    }
}
