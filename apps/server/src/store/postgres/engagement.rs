use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::ids::{MessageId, ReactionId, UserId};

use super::{advisory_lock, PgStore};
use crate::models::{MessageReaction, StarredMessage, Toggle};
use crate::store::{EngagementStore, StoreResult};

#[derive(sqlx::FromRow)]
struct ReactionRow {
    id: ReactionId,
    message_id: MessageId,
    user_id: UserId,
    emoji: String,
    created_at: DateTime<Utc>,
}

impl From<ReactionRow> for MessageReaction {
    fn from(row: ReactionRow) -> Self {
        MessageReaction {
            id: row.id,
            message_id: row.message_id,
            user_id: row.user_id,
            emoji: row.emoji,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StarRow {
    message_id: MessageId,
    user_id: UserId,
    created_at: DateTime<Utc>,
}

impl From<StarRow> for StarredMessage {
    fn from(row: StarRow) -> Self {
        StarredMessage {
            message_id: row.message_id,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

fn raw_ids(ids: &[MessageId]) -> Vec<uuid::Uuid> {
    ids.iter().map(|id| id.0).collect()
}

#[async_trait]
impl EngagementStore for PgStore {
    async fn toggle_reaction(
        &self,
        reaction: &MessageReaction,
    ) -> StoreResult<Toggle<MessageReaction>> {
        let mut tx = self.pool.begin().await?;
        advisory_lock(
            &mut tx,
            "reaction",
            &format!("{}:{}", reaction.message_id, reaction.user_id),
        )
        .await?;

        let removed = sqlx::query_as::<_, ReactionRow>(
            "DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2 \
             RETURNING id, message_id, user_id, emoji, created_at",
        )
        .bind(reaction.message_id)
        .bind(reaction.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match removed {
            Some(row) => Toggle::Removed(row.into()),
            None => {
                let row = sqlx::query_as::<_, ReactionRow>(
                    "INSERT INTO message_reactions (id, message_id, user_id, emoji, created_at) \
                     VALUES ($1, $2, $3, $4, $5) \
                     RETURNING id, message_id, user_id, emoji, created_at",
                )
                .bind(reaction.id)
                .bind(reaction.message_id)
                .bind(reaction.user_id)
                .bind(&reaction.emoji)
                .bind(reaction.created_at)
                .fetch_one(&mut *tx)
                .await?;
                Toggle::Added(row.into())
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_reaction(&self, id: ReactionId, user_id: UserId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM message_reactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2")
                .bind(message_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reactions_for_messages(
        &self,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageReaction>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ReactionRow>(
            "SELECT id, message_id, user_id, emoji, created_at FROM message_reactions \
             WHERE message_id = ANY($1) ORDER BY created_at",
        )
        .bind(raw_ids(message_ids))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MessageReaction::from).collect())
    }

    async fn insert_star(&self, star: &StarredMessage) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO starred_messages (message_id, user_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(star.message_id)
        .bind(star.user_id)
        .bind(star.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_star(&self, message_id: MessageId, user_id: UserId) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM starred_messages WHERE message_id = $1 AND user_id = $2")
                .bind(message_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn toggle_star(&self, star: &StarredMessage) -> StoreResult<Toggle<StarredMessage>> {
        let mut tx = self.pool.begin().await?;
        advisory_lock(
            &mut tx,
            "star",
            &format!("{}:{}", star.message_id, star.user_id),
        )
        .await?;

        let removed = sqlx::query_as::<_, StarRow>(
            "DELETE FROM starred_messages WHERE message_id = $1 AND user_id = $2 \
             RETURNING message_id, user_id, created_at",
        )
        .bind(star.message_id)
        .bind(star.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match removed {
            Some(row) => Toggle::Removed(row.into()),
            None => {
                sqlx::query(
                    "INSERT INTO starred_messages (message_id, user_id, created_at) \
                     VALUES ($1, $2, $3)",
                )
                .bind(star.message_id)
                .bind(star.user_id)
                .bind(star.created_at)
                .execute(&mut *tx)
                .await?;
                Toggle::Added(star.clone())
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn starred_among(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageId>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<MessageId> = sqlx::query_scalar(
            "SELECT message_id FROM starred_messages WHERE user_id = $1 AND message_id = ANY($2)",
        )
        .bind(user_id)
        .bind(raw_ids(message_ids))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_stars(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<StarredMessage>> {
        let rows = sqlx::query_as::<_, StarRow>(
            "SELECT s.message_id, s.user_id, s.created_at FROM starred_messages s \
             JOIN messages m ON m.id = s.message_id \
             WHERE s.user_id = $1 \
               AND NOT EXISTS (SELECT 1 FROM message_deletions d \
                               WHERE d.message_id = s.message_id AND d.user_id = $1) \
             ORDER BY s.created_at DESC, s.message_id DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StarredMessage::from).collect())
    }
}
