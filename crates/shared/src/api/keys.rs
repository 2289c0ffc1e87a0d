use crate::ids::{ConversationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All key material travels as standard base64 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct RegisterIdentityKeyRequest {
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct IdentityKeyResponse {
    pub user_id: UserId,
    pub public_key: String,
    pub updated_at: DateTime<Utc>,
}

/// A single one-time pre-key as uploaded by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PreKeyUpload {
    pub key_id: u32,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UploadPreKeysRequest {
    pub pre_keys: Vec<PreKeyUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UploadPreKeysResponse {
    /// Keys newly stored; re-uploads of an existing key id are ignored.
    pub accepted: u64,
    pub available: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct PreKeyCountResponse {
    pub available: i64,
    pub needs_replenish: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UploadSignedPreKeyRequest {
    pub key_id: u32,
    pub public_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SignedPreKeyResponse {
    pub user_id: UserId,
    pub key_id: u32,
    pub public_key: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct OneTimePreKeyResponse {
    pub key_id: u32,
    pub public_key: String,
}

/// Everything a peer needs to bootstrap a session with `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct KeyBundleResponse {
    pub user_id: UserId,
    pub identity_key: String,
    pub signed_pre_key: SignedPreKeyResponse,
    pub one_time_pre_key: Option<OneTimePreKeyResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct FingerprintResponse {
    pub user_id: UserId,
    /// 60 digits in 12 space-separated groups of 5.
    pub fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StoreConversationKeyRequest {
    pub public_key: String,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ConversationKeyResponse {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub public_key: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_pre_keys_request_serde() {
        let json = r#"{"pre_keys":[{"key_id":1,"public_key":"AAAA"},{"key_id":2,"public_key":"BBBB"}]}"#;
        let req: UploadPreKeysRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.pre_keys.len(), 2);
        assert_eq!(req.pre_keys[1].key_id, 2);
    }

    #[test]
    fn key_bundle_without_one_time_key_serializes_null() {
        let user_id = UserId::new();
        let bundle = KeyBundleResponse {
            user_id,
            identity_key: "aWQ=".into(),
            signed_pre_key: SignedPreKeyResponse {
                user_id,
                key_id: 7,
                public_key: "c3Br".into(),
                signature: "c2ln".into(),
                created_at: Utc::now(),
            },
            one_time_pre_key: None,
        };
        let json = serde_json::to_value(&bundle).unwrap();
        assert!(json["one_time_pre_key"].is_null());
        assert_eq!(json["signed_pre_key"]["key_id"], 7);
    }
}
