use chrono::{DateTime, Utc};
use courier_shared::api::message::{
    Attachment, EditRecordResponse, MessageResponse, MessageStatus, MessageType, ReplyPreview,
};
use courier_shared::constants::MAX_MESSAGE_SIZE_BYTES;
use courier_shared::error::CourierError;
use courier_shared::ids::{ConversationId, MessageId, UserId};

use super::conversation::LastMessage;
use super::engagement::{summarize_reactions, MessageReaction};

/// Message payload. A message is either readable by the server or carries
/// ciphertext plus its IV, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Plain { content: String },
    Encrypted { ciphertext: String, iv: String },
}

impl MessageBody {
    /// Build a body from the optional wire fields.
    pub fn from_parts(
        content: Option<String>,
        encrypted_content: Option<String>,
        iv: Option<String>,
    ) -> Result<Self, CourierError> {
        let content = content.unwrap_or_default();
        let body = match (encrypted_content, iv) {
            (Some(ciphertext), Some(iv)) => {
                if !content.is_empty() {
                    return Err(CourierError::Validation(
                        "provide either content or encrypted_content, not both".into(),
                    ));
                }
                if ciphertext.is_empty() || iv.is_empty() {
                    return Err(CourierError::Validation(
                        "encrypted_content and iv must not be empty".into(),
                    ));
                }
                MessageBody::Encrypted { ciphertext, iv }
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(CourierError::Validation(
                    "encrypted_content and iv must be provided together".into(),
                ));
            }
            (None, None) => MessageBody::Plain { content },
        };
        body.check_size()?;
        Ok(body)
    }

    /// Rebuild a body from stored columns.
    pub fn from_columns(
        content: String,
        encrypted_content: Option<String>,
        iv: Option<String>,
    ) -> Result<Self, String> {
        match (encrypted_content, iv) {
            (Some(ciphertext), Some(iv)) => Ok(MessageBody::Encrypted { ciphertext, iv }),
            (None, None) => Ok(MessageBody::Plain { content }),
            _ => Err("encrypted_content stored without matching iv".into()),
        }
    }

    fn check_size(&self) -> Result<(), CourierError> {
        let len = match self {
            MessageBody::Plain { content } => content.len(),
            MessageBody::Encrypted { ciphertext, iv } => ciphertext.len() + iv.len(),
        };
        if len > MAX_MESSAGE_SIZE_BYTES {
            return Err(CourierError::Validation(format!(
                "message exceeds {MAX_MESSAGE_SIZE_BYTES} bytes"
            )));
        }
        Ok(())
    }

    /// Plaintext content; empty for encrypted bodies.
    pub fn content(&self) -> &str {
        match self {
            MessageBody::Plain { content } => content,
            MessageBody::Encrypted { .. } => "",
        }
    }

    pub fn encrypted_content(&self) -> Option<&str> {
        match self {
            MessageBody::Encrypted { ciphertext, .. } => Some(ciphertext),
            MessageBody::Plain { .. } => None,
        }
    }

    pub fn iv(&self) -> Option<&str> {
        match self {
            MessageBody::Encrypted { iv, .. } => Some(iv),
            MessageBody::Plain { .. } => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, MessageBody::Encrypted { .. })
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, MessageBody::Plain { content } if content.trim().is_empty())
    }
}

/// Message kind. Media kinds always carry their attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image(Attachment),
    Video(Attachment),
    Audio(Attachment),
    File(Attachment),
}

impl MessageKind {
    pub fn from_parts(
        message_type: MessageType,
        attachment: Option<Attachment>,
    ) -> Result<Self, CourierError> {
        let kind = match (message_type, attachment) {
            (MessageType::Text, None) => MessageKind::Text,
            (MessageType::Text, Some(_)) => {
                return Err(CourierError::Validation(
                    "text messages cannot carry an attachment".into(),
                ));
            }
            (_, None) => {
                return Err(CourierError::Validation(format!(
                    "{} messages require an attachment",
                    message_type.as_str()
                )));
            }
            (_, Some(attachment)) if attachment.url.trim().is_empty() => {
                return Err(CourierError::Validation(
                    "attachment url must not be empty".into(),
                ));
            }
            (MessageType::Image, Some(a)) => MessageKind::Image(a),
            (MessageType::Video, Some(a)) => MessageKind::Video(a),
            (MessageType::Audio, Some(a)) => MessageKind::Audio(a),
            (MessageType::File, Some(a)) => MessageKind::File(a),
        };
        Ok(kind)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            MessageKind::Text => MessageType::Text,
            MessageKind::Image(_) => MessageType::Image,
            MessageKind::Video(_) => MessageType::Video,
            MessageKind::Audio(_) => MessageType::Audio,
            MessageKind::File(_) => MessageType::File,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            MessageKind::Text => None,
            MessageKind::Image(a)
            | MessageKind::Video(a)
            | MessageKind::Audio(a)
            | MessageKind::File(a) => Some(a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub pinned_by: UserId,
    pub pinned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditState {
    pub count: i32,
    /// Body before the first edit.
    pub original: Option<MessageBody>,
    pub edited_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: MessageBody,
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub reply_to_id: Option<MessageId>,
    pub pin: Option<Pin>,
    pub edit: EditState,
    pub forwarded_from_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        conversation_id: ConversationId,
        sender_id: UserId,
        body: MessageBody,
        kind: MessageKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            body,
            kind,
            status: MessageStatus::Sent,
            delivered_at: None,
            read_at: None,
            reply_to_id: None,
            pin: None,
            edit: EditState::default(),
            forwarded_from_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.forwarded_from_id.is_some()
    }

    /// Move the status forward. Returns `false` and leaves the message
    /// untouched when `status` is not strictly ahead of the current one.
    pub fn advance_status(&mut self, status: MessageStatus, at: DateTime<Utc>) -> bool {
        if status <= self.status {
            return false;
        }
        self.status = status;
        if self.delivered_at.is_none() {
            self.delivered_at = Some(at);
        }
        if status == MessageStatus::Read {
            self.read_at = Some(at);
        }
        self.updated_at = at;
        true
    }

    /// Replace the body and return the history record for the replaced one.
    pub fn apply_edit(
        &mut self,
        body: MessageBody,
        edited_by: UserId,
        at: DateTime<Utc>,
    ) -> MessageEditRecord {
        let previous = std::mem::replace(&mut self.body, body);
        if self.edit.original.is_none() {
            self.edit.original = Some(previous.clone());
        }
        self.edit.count += 1;
        self.edit.edited_at = Some(at);
        self.updated_at = at;
        MessageEditRecord {
            message_id: self.id,
            previous,
            edited_by,
            edited_at: at,
        }
    }

    pub fn to_last_message(&self) -> LastMessage {
        LastMessage {
            message_id: self.id,
            sender_id: self.sender_id,
            body: self.body.clone(),
            sent_at: self.created_at,
        }
    }

    pub fn to_reply_preview(&self) -> ReplyPreview {
        ReplyPreview {
            id: self.id,
            sender_id: self.sender_id,
            content: self.body.content().to_string(),
            encrypted_content: self.body.encrypted_content().map(str::to_string),
            iv: self.body.iv().map(str::to_string),
            message_type: self.kind.message_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEditRecord {
    pub message_id: MessageId,
    pub previous: MessageBody,
    pub edited_by: UserId,
    pub edited_at: DateTime<Utc>,
}

impl From<MessageEditRecord> for EditRecordResponse {
    fn from(record: MessageEditRecord) -> Self {
        EditRecordResponse {
            message_id: record.message_id,
            previous_content: record.previous.content().to_string(),
            previous_encrypted_content: record.previous.encrypted_content().map(str::to_string),
            previous_iv: record.previous.iv().map(str::to_string),
            edited_by: record.edited_by,
            edited_at: record.edited_at,
        }
    }
}

/// A message enriched with what one viewer sees alongside it.
#[derive(Debug, Clone)]
pub struct MessageView {
    pub message: Message,
    pub reply_to: Option<Message>,
    pub reactions: Vec<MessageReaction>,
    pub starred: bool,
}

impl MessageView {
    pub fn bare(message: Message) -> Self {
        Self {
            message,
            reply_to: None,
            reactions: Vec::new(),
            starred: false,
        }
    }

    pub fn into_response(self, viewer: UserId) -> MessageResponse {
        let MessageView {
            message: m,
            reply_to,
            reactions,
            starred,
        } = self;
        MessageResponse {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            content: m.body.content().to_string(),
            encrypted_content: m.body.encrypted_content().map(str::to_string),
            iv: m.body.iv().map(str::to_string),
            message_type: m.kind.message_type(),
            attachment: m.kind.attachment().cloned(),
            status: m.status,
            delivered_at: m.delivered_at,
            read_at: m.read_at,
            reply_to_id: m.reply_to_id,
            reply_to: reply_to.as_ref().map(Message::to_reply_preview),
            is_pinned: m.pin.is_some(),
            pinned_at: m.pin.map(|p| p.pinned_at),
            pinned_by: m.pin.map(|p| p.pinned_by),
            edit_count: m.edit.count,
            original_content: m.edit.original.as_ref().map(|b| b.content().to_string()),
            edited_at: m.edit.edited_at,
            is_forwarded: m.is_forwarded(),
            forwarded_from_id: m.forwarded_from_id,
            reactions: summarize_reactions(&reactions, viewer),
            is_starred: starred,
            created_at: m.created_at,
        }
    }
}
