use std::collections::HashSet;

use chrono::{DateTime, Utc};
use courier_shared::api::keys::PreKeyUpload;
use courier_shared::constants::{MAX_PRE_KEY_BATCH, PRE_KEY_REPLENISH_THRESHOLD};
use courier_shared::error::CourierError;
use courier_shared::ids::{ConversationId, UserId};

use super::ServiceContext;
use crate::fingerprint::display_fingerprint;
use crate::models::{ConversationKey, IdentityKey, NewPreKey, PreKey, SignedPreKey};
use crate::validation::validate_key_material;

/// Everything needed to start a session with a user.
#[derive(Debug, Clone)]
pub struct KeyBundle {
    pub identity_key: IdentityKey,
    pub signed_pre_key: SignedPreKey,
    pub one_time_pre_key: Option<PreKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreKeyStock {
    pub available: i64,
}

impl PreKeyStock {
    pub fn needs_replenish(&self) -> bool {
        self.available < PRE_KEY_REPLENISH_THRESHOLD
    }
}

/// Public-key directory: identity keys, one-time and signed pre-keys,
/// per-conversation keys and fingerprints. Private keys never reach it.
#[derive(Clone)]
pub struct KeyRegistry {
    ctx: ServiceContext,
}

impl KeyRegistry {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    // ─── Identity keys ──────────────────────────────────────

    pub async fn register_identity_key(
        &self,
        user_id: UserId,
        public_key: &str,
    ) -> Result<IdentityKey, CourierError> {
        validate_key_material("public_key", public_key)?;
        let key = self
            .ctx
            .call(
                "upsert_identity_key",
                self.ctx
                    .store
                    .upsert_identity_key(user_id, public_key, self.ctx.now()),
            )
            .await?;
        tracing::info!(%user_id, "identity key registered");
        Ok(key)
    }

    pub async fn identity_key(&self, user_id: UserId) -> Result<IdentityKey, CourierError> {
        self.ctx
            .call("get_identity_key", self.ctx.store.get_identity_key(user_id))
            .await?
            .ok_or(CourierError::NotFound)
    }

    pub async fn fingerprint(&self, user_id: UserId) -> Result<String, CourierError> {
        let key = self.identity_key(user_id).await?;
        let bytes = validate_key_material("public_key", &key.public_key)
            .map_err(|_| CourierError::Internal("stored identity key is not valid base64".into()))?;
        Ok(display_fingerprint(user_id, &bytes))
    }

    // ─── One-time pre-keys ──────────────────────────────────

    /// Store a batch of one-time pre-keys. Key ids already uploaded are
    /// skipped, so a consumed key can never come back.
    pub async fn upload_pre_keys(
        &self,
        user_id: UserId,
        keys: &[PreKeyUpload],
    ) -> Result<(u64, PreKeyStock), CourierError> {
        if keys.is_empty() {
            return Err(CourierError::Validation("pre_keys must not be empty".into()));
        }
        if keys.len() > MAX_PRE_KEY_BATCH {
            return Err(CourierError::Validation(format!(
                "at most {MAX_PRE_KEY_BATCH} pre-keys per upload"
            )));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        let mut batch = Vec::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key.key_id) {
                return Err(CourierError::Validation(format!(
                    "duplicate key_id {} in batch",
                    key.key_id
                )));
            }
            validate_key_material("public_key", &key.public_key)?;
            batch.push(NewPreKey {
                key_id: key.key_id,
                public_key: key.public_key.clone(),
            });
        }

        let accepted = self
            .ctx
            .call(
                "insert_pre_keys",
                self.ctx
                    .store
                    .insert_pre_keys(user_id, &batch, self.ctx.now()),
            )
            .await?;
        let stock = self.available_pre_keys(user_id).await?;
        tracing::info!(%user_id, accepted, available = stock.available, "pre-keys uploaded");
        Ok((accepted, stock))
    }

    pub async fn available_pre_keys(&self, user_id: UserId) -> Result<PreKeyStock, CourierError> {
        let available = self
            .ctx
            .call(
                "count_available_pre_keys",
                self.ctx.store.count_available_pre_keys(user_id),
            )
            .await?;
        Ok(PreKeyStock { available })
    }

    /// Hand out the oldest unused pre-key, at most once.
    pub async fn consume_pre_key(&self, user_id: UserId) -> Result<Option<PreKey>, CourierError> {
        let claimed = self
            .ctx
            .call(
                "claim_pre_key",
                self.ctx.store.claim_pre_key(user_id, self.ctx.now()),
            )
            .await?;
        if claimed.is_none() {
            tracing::warn!(%user_id, "one-time pre-keys exhausted");
        }
        Ok(claimed)
    }

    // ─── Signed pre-keys ────────────────────────────────────

    /// Install a new signed pre-key; the previous one is retired, not deleted.
    pub async fn upload_signed_pre_key(
        &self,
        user_id: UserId,
        key_id: u32,
        public_key: &str,
        signature: &str,
    ) -> Result<SignedPreKey, CourierError> {
        validate_key_material("public_key", public_key)?;
        validate_key_material("signature", signature)?;
        let key = SignedPreKey {
            user_id,
            key_id,
            public_key: public_key.to_string(),
            signature: signature.to_string(),
            is_active: true,
            created_at: self.ctx.now(),
            retired_at: None,
        };
        let stored = self
            .ctx
            .call(
                "replace_signed_pre_key",
                self.ctx.store.replace_signed_pre_key(&key),
            )
            .await?;
        tracing::info!(%user_id, key_id, "signed pre-key rotated");
        Ok(stored)
    }

    pub async fn signed_pre_key(&self, user_id: UserId) -> Result<SignedPreKey, CourierError> {
        self.ctx
            .call(
                "active_signed_pre_key",
                self.ctx.store.active_signed_pre_key(user_id),
            )
            .await?
            .ok_or(CourierError::NotFound)
    }

    /// Resolve a signed pre-key by id, including recently retired ones.
    pub async fn signed_pre_key_by_id(
        &self,
        user_id: UserId,
        key_id: u32,
    ) -> Result<SignedPreKey, CourierError> {
        self.ctx
            .call(
                "find_signed_pre_key",
                self.ctx.store.find_signed_pre_key(user_id, key_id),
            )
            .await?
            .ok_or(CourierError::NotFound)
    }

    /// Drop signed pre-keys retired before `retired_before`. Active keys are
    /// never touched.
    pub async fn purge_retired_signed_pre_keys(
        &self,
        retired_before: DateTime<Utc>,
    ) -> Result<u64, CourierError> {
        self.ctx
            .call_unbounded(
                "purge_retired_signed_pre_keys",
                self.ctx
                    .store
                    .purge_retired_signed_pre_keys(retired_before),
            )
            .await
    }

    /// Identity key plus active signed pre-key, plus one freshly claimed
    /// one-time pre-key when any remain.
    pub async fn key_bundle(&self, user_id: UserId) -> Result<KeyBundle, CourierError> {
        let (identity_key, signed_pre_key) =
            futures::try_join!(self.identity_key(user_id), self.signed_pre_key(user_id))?;
        let one_time_pre_key = self.consume_pre_key(user_id).await?;
        Ok(KeyBundle {
            identity_key,
            signed_pre_key,
            one_time_pre_key,
        })
    }

    // ─── Conversation keys ──────────────────────────────────

    pub async fn store_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        public_key: &str,
        version: i32,
    ) -> Result<ConversationKey, CourierError> {
        if version < 1 {
            return Err(CourierError::Validation("version must be at least 1".into()));
        }
        validate_key_material("public_key", public_key)?;
        let now = self.ctx.now();
        let key = ConversationKey {
            conversation_id,
            user_id,
            public_key: public_key.to_string(),
            version,
            is_revoked: false,
            created_at: now,
            updated_at: now,
        };
        self.ctx
            .call(
                "upsert_conversation_key",
                self.ctx.store.upsert_conversation_key(&key),
            )
            .await
    }

    pub async fn conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<ConversationKey, CourierError> {
        self.ctx
            .call(
                "latest_conversation_key",
                self.ctx
                    .store
                    .latest_conversation_key(conversation_id, user_id),
            )
            .await?
            .ok_or(CourierError::NotFound)
    }

    pub async fn revoke_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        version: i32,
    ) -> Result<(), CourierError> {
        let revoked = self
            .ctx
            .call(
                "revoke_conversation_key",
                self.ctx.store.revoke_conversation_key(
                    conversation_id,
                    user_id,
                    version,
                    self.ctx.now(),
                ),
            )
            .await?;
        if !revoked {
            return Err(CourierError::NotFound);
        }
        tracing::info!(%conversation_id, %user_id, version, "conversation key revoked");
        Ok(())
    }
}
