use crate::ids::{ConversationId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to open (or fetch) the conversation with another user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct CreateConversationRequest {
    pub user_id: UserId,
}

/// Summary of the most recent message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct LastMessageSummary {
    pub message_id: MessageId,
    pub sender_id: UserId,
    /// Empty when the message is encrypted.
    pub content: String,
    pub encrypted_content: Option<String>,
    pub iv: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// A conversation as seen by one of its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ConversationResponse {
    pub id: ConversationId,
    pub other_user_id: UserId,
    pub last_message: Option<LastMessageSummary>,
    pub unread_count: i64,
    /// Whether the other participant is currently typing.
    pub is_typing: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Offset pagination for the conversation list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema, utoipa::IntoParams))]
pub struct ConversationListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationResponse>,
}

/// Typing signal for the caller's slot of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
