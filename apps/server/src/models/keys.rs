use chrono::{DateTime, Utc};
use courier_shared::api::keys::{
    ConversationKeyResponse, IdentityKeyResponse, OneTimePreKeyResponse, SignedPreKeyResponse,
};
use courier_shared::ids::{ConversationId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKey {
    pub user_id: UserId,
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IdentityKey> for IdentityKeyResponse {
    fn from(k: IdentityKey) -> Self {
        IdentityKeyResponse {
            user_id: k.user_id,
            public_key: k.public_key,
            updated_at: k.updated_at,
        }
    }
}

/// A validated one-time pre-key awaiting insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPreKey {
    pub key_id: u32,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreKey {
    pub user_id: UserId,
    pub key_id: u32,
    pub public_key: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl From<PreKey> for OneTimePreKeyResponse {
    fn from(k: PreKey) -> Self {
        OneTimePreKeyResponse {
            key_id: k.key_id,
            public_key: k.public_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPreKey {
    pub user_id: UserId,
    pub key_id: u32,
    pub public_key: String,
    pub signature: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl From<SignedPreKey> for SignedPreKeyResponse {
    fn from(k: SignedPreKey) -> Self {
        SignedPreKeyResponse {
            user_id: k.user_id,
            key_id: k.key_id,
            public_key: k.public_key,
            signature: k.signature,
            created_at: k.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationKey {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub public_key: String,
    pub version: i32,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationKey> for ConversationKeyResponse {
    fn from(k: ConversationKey) -> Self {
        ConversationKeyResponse {
            conversation_id: k.conversation_id,
            user_id: k.user_id,
            public_key: k.public_key,
            version: k.version,
            created_at: k.created_at,
            updated_at: k.updated_at,
        }
    }
}
