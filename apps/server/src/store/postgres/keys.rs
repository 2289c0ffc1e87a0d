use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::ids::{ConversationId, UserId};

use super::{advisory_lock, key_id_from_db, PgStore};
use crate::models::{ConversationKey, IdentityKey, NewPreKey, PreKey, SignedPreKey};
use crate::store::{KeyStore, StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct IdentityKeyRow {
    user_id: UserId,
    public_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<IdentityKeyRow> for IdentityKey {
    fn from(row: IdentityKeyRow) -> Self {
        IdentityKey {
            user_id: row.user_id,
            public_key: row.public_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PreKeyRow {
    user_id: UserId,
    key_id: i64,
    public_key: String,
    is_used: bool,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl TryFrom<PreKeyRow> for PreKey {
    type Error = StoreError;

    fn try_from(row: PreKeyRow) -> Result<Self, Self::Error> {
        Ok(PreKey {
            user_id: row.user_id,
            key_id: key_id_from_db(row.key_id)?,
            public_key: row.public_key,
            is_used: row.is_used,
            created_at: row.created_at,
            used_at: row.used_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SignedPreKeyRow {
    user_id: UserId,
    key_id: i64,
    public_key: String,
    signature: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    retired_at: Option<DateTime<Utc>>,
}

impl TryFrom<SignedPreKeyRow> for SignedPreKey {
    type Error = StoreError;

    fn try_from(row: SignedPreKeyRow) -> Result<Self, Self::Error> {
        Ok(SignedPreKey {
            user_id: row.user_id,
            key_id: key_id_from_db(row.key_id)?,
            public_key: row.public_key,
            signature: row.signature,
            is_active: row.is_active,
            created_at: row.created_at,
            retired_at: row.retired_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ConversationKeyRow {
    conversation_id: ConversationId,
    user_id: UserId,
    public_key: String,
    version: i32,
    is_revoked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationKeyRow> for ConversationKey {
    fn from(row: ConversationKeyRow) -> Self {
        ConversationKey {
            conversation_id: row.conversation_id,
            user_id: row.user_id,
            public_key: row.public_key,
            version: row.version,
            is_revoked: row.is_revoked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SIGNED_PRE_KEY_COLUMNS: &str =
    "user_id, key_id, public_key, signature, is_active, created_at, retired_at";

const CONVERSATION_KEY_COLUMNS: &str =
    "conversation_id, user_id, public_key, version, is_revoked, created_at, updated_at";

#[async_trait]
impl KeyStore for PgStore {
    // ─── Identity keys ──────────────────────────────────────

    async fn upsert_identity_key(
        &self,
        user_id: UserId,
        public_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<IdentityKey> {
        let row = sqlx::query_as::<_, IdentityKeyRow>(
            "INSERT INTO identity_keys (user_id, public_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $3) \
             ON CONFLICT (user_id) DO UPDATE \
               SET public_key = EXCLUDED.public_key, updated_at = EXCLUDED.updated_at \
             RETURNING user_id, public_key, created_at, updated_at",
        )
        .bind(user_id)
        .bind(public_key)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_identity_key(&self, user_id: UserId) -> StoreResult<Option<IdentityKey>> {
        let row = sqlx::query_as::<_, IdentityKeyRow>(
            "SELECT user_id, public_key, created_at, updated_at FROM identity_keys \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(IdentityKey::from))
    }

    // ─── One-time pre-keys ──────────────────────────────────

    async fn insert_pre_keys(
        &self,
        user_id: UserId,
        keys: &[NewPreKey],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut accepted = 0;
        for key in keys {
            let result = sqlx::query(
                "INSERT INTO pre_keys (id, user_id, key_id, public_key, is_used, created_at) \
                 VALUES ($1, $2, $3, $4, false, $5) \
                 ON CONFLICT (user_id, key_id) DO NOTHING",
            )
            .bind(uuid::Uuid::now_v7())
            .bind(user_id)
            .bind(i64::from(key.key_id))
            .bind(&key.public_key)
            .bind(at)
            .execute(&mut *tx)
            .await?;
            accepted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(accepted)
    }

    async fn count_available_pre_keys(&self, user_id: UserId) -> StoreResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pre_keys WHERE user_id = $1 AND NOT is_used")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn claim_pre_key(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<PreKey>> {
        let row = sqlx::query_as::<_, PreKeyRow>(
            "UPDATE pre_keys SET is_used = true, used_at = $2 \
             WHERE id = ( \
               SELECT id FROM pre_keys \
               WHERE user_id = $1 AND NOT is_used \
               ORDER BY created_at, key_id \
               LIMIT 1 \
               FOR UPDATE SKIP LOCKED) \
             RETURNING user_id, key_id, public_key, is_used, created_at, used_at",
        )
        .bind(user_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PreKey::try_from).transpose()
    }

    // ─── Signed pre-keys ────────────────────────────────────

    async fn replace_signed_pre_key(&self, key: &SignedPreKey) -> StoreResult<SignedPreKey> {
        let mut tx = self.pool.begin().await?;
        advisory_lock(&mut tx, "signed_pre_key", &key.user_id.to_string()).await?;

        sqlx::query(
            "UPDATE signed_pre_keys SET is_active = false, retired_at = $3 \
             WHERE user_id = $1 AND is_active AND key_id <> $2",
        )
        .bind(key.user_id)
        .bind(i64::from(key.key_id))
        .bind(key.created_at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, SignedPreKeyRow>(&format!(
            "INSERT INTO signed_pre_keys (id, user_id, key_id, public_key, signature, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, true, $6) \
             ON CONFLICT (user_id, key_id) DO UPDATE \
               SET public_key = EXCLUDED.public_key, signature = EXCLUDED.signature, \
                   is_active = true, retired_at = NULL, created_at = EXCLUDED.created_at \
             RETURNING {SIGNED_PRE_KEY_COLUMNS}"
        ))
        .bind(uuid::Uuid::now_v7())
        .bind(key.user_id)
        .bind(i64::from(key.key_id))
        .bind(&key.public_key)
        .bind(&key.signature)
        .bind(key.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        SignedPreKey::try_from(row)
    }

    async fn active_signed_pre_key(&self, user_id: UserId) -> StoreResult<Option<SignedPreKey>> {
        let row = sqlx::query_as::<_, SignedPreKeyRow>(&format!(
            "SELECT {SIGNED_PRE_KEY_COLUMNS} FROM signed_pre_keys WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SignedPreKey::try_from).transpose()
    }

    async fn find_signed_pre_key(
        &self,
        user_id: UserId,
        key_id: u32,
    ) -> StoreResult<Option<SignedPreKey>> {
        let row = sqlx::query_as::<_, SignedPreKeyRow>(&format!(
            "SELECT {SIGNED_PRE_KEY_COLUMNS} FROM signed_pre_keys WHERE user_id = $1 AND key_id = $2"
        ))
        .bind(user_id)
        .bind(i64::from(key_id))
        .fetch_optional(&self.pool)
        .await?;
        row.map(SignedPreKey::try_from).transpose()
    }

    async fn purge_retired_signed_pre_keys(
        &self,
        retired_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM signed_pre_keys WHERE NOT is_active AND retired_at < $1")
                .bind(retired_before)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    // ─── Conversation keys ──────────────────────────────────

    async fn upsert_conversation_key(
        &self,
        key: &ConversationKey,
    ) -> StoreResult<ConversationKey> {
        let row = sqlx::query_as::<_, ConversationKeyRow>(&format!(
            "INSERT INTO conversation_keys (id, conversation_id, user_id, public_key, version, \
               is_revoked, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, false, $6, $7) \
             ON CONFLICT (conversation_id, user_id, version) WHERE NOT is_revoked DO UPDATE \
               SET public_key = EXCLUDED.public_key, updated_at = EXCLUDED.updated_at \
             RETURNING {CONVERSATION_KEY_COLUMNS}"
        ))
        .bind(uuid::Uuid::now_v7())
        .bind(key.conversation_id)
        .bind(key.user_id)
        .bind(&key.public_key)
        .bind(key.version)
        .bind(key.created_at)
        .bind(key.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn latest_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> StoreResult<Option<ConversationKey>> {
        let row = sqlx::query_as::<_, ConversationKeyRow>(&format!(
            "SELECT {CONVERSATION_KEY_COLUMNS} FROM conversation_keys \
             WHERE conversation_id = $1 AND user_id = $2 AND NOT is_revoked \
             ORDER BY version DESC LIMIT 1"
        ))
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ConversationKey::from))
    }

    async fn revoke_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        version: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE conversation_keys SET is_revoked = true, updated_at = $4 \
             WHERE conversation_id = $1 AND user_id = $2 AND version = $3 AND NOT is_revoked",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(version)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
