use crate::api::engagement::ReactionSummary;
use crate::ids::{ConversationId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of a message. Ordered: `Sent < Delivered < Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Numeric rank used for storage and forward-only comparisons.
    pub fn rank(self) -> i16 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
        }
    }

    pub fn from_rank(rank: i16) -> Option<Self> {
        match rank {
            0 => Some(MessageStatus::Sent),
            1 => Some(MessageStatus::Delivered),
            2 => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

/// Wire-level message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    File,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            "video" => Some(MessageType::Video),
            "audio" => Some(MessageType::Audio),
            "file" => Some(MessageType::File),
            _ => None,
        }
    }
}

/// Attachment metadata carried by media messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct Attachment {
    pub url: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

/// Request to send a message. Exactly one of `content` or
/// (`encrypted_content`, `iv`) must be provided.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct SendMessageRequest {
    pub content: Option<String>,
    pub encrypted_content: Option<String>,
    pub iv: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
    pub attachment: Option<Attachment>,
    pub reply_to_id: Option<MessageId>,
}

/// Request to replace a message's content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct EditMessageRequest {
    pub content: Option<String>,
    pub encrypted_content: Option<String>,
    pub iv: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct UpdateStatusRequest {
    pub status: MessageStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ForwardMessageRequest {
    pub conversation_id: ConversationId,
}

/// Preview of the message being replied to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ReplyPreview {
    pub id: MessageId,
    pub sender_id: UserId,
    pub content: String,
    pub encrypted_content: Option<String>,
    pub iv: Option<String>,
    pub message_type: MessageType,
}

/// Full message view for one viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MessageResponse {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    /// Empty when the message is encrypted.
    pub content: String,
    pub encrypted_content: Option<String>,
    pub iv: Option<String>,
    pub message_type: MessageType,
    pub attachment: Option<Attachment>,
    pub status: MessageStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub reply_to_id: Option<MessageId>,
    pub reply_to: Option<ReplyPreview>,
    pub is_pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub pinned_by: Option<UserId>,
    pub edit_count: i32,
    pub original_content: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub forwarded_from_id: Option<MessageId>,
    pub is_forwarded: bool,
    #[serde(default)]
    pub reactions: Vec<ReactionSummary>,
    #[serde(default)]
    pub is_starred: bool,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for cursor-paginated message history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema, utoipa::IntoParams))]
pub struct MessageHistoryQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

/// Paginated message history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MessageHistoryResponse {
    pub messages: Vec<MessageResponse>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Query parameters for message search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema, utoipa::IntoParams))]
pub struct MessageSearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MessageListResponse {
    pub messages: Vec<MessageResponse>,
}

/// One entry in a message's edit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct EditRecordResponse {
    pub message_id: MessageId,
    pub previous_content: String,
    pub previous_encrypted_content: Option<String>,
    pub previous_iv: Option<String>,
    pub edited_by: UserId,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct EditHistoryResponse {
    pub message_id: MessageId,
    pub edits: Vec<EditRecordResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MarkReadResponse {
    pub updated: u64,
}
