use chrono::{DateTime, Duration, Utc};
use courier_shared::api::conversation::{ConversationResponse, LastMessageSummary};
use courier_shared::constants::TYPING_TTL_SECS;
use courier_shared::ids::{ConversationId, MessageId, UserId};

use super::message::MessageBody;

/// Typing signal for one participant.
///
/// The stored flag is never authoritative on its own: a signal only counts
/// while it is younger than [`TYPING_TTL_SECS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypingPresence {
    pub active: bool,
    pub signaled_at: Option<DateTime<Utc>>,
}

impl TypingPresence {
    /// Record a new signal. The timestamp only moves when typing starts.
    pub fn signal(self, is_typing: bool, now: DateTime<Utc>) -> Self {
        if is_typing {
            Self {
                active: true,
                signaled_at: Some(now),
            }
        } else {
            Self {
                active: false,
                signaled_at: self.signaled_at,
            }
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match (self.active, self.signaled_at) {
            (true, Some(at)) => now - at < Duration::seconds(TYPING_TTL_SECS),
            _ => false,
        }
    }
}

/// One side of a two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: UserId,
    pub unread: i64,
    pub typing: TypingPresence,
    /// Set when this participant deleted the conversation for themselves.
    pub hidden_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            unread: 0,
            typing: TypingPresence::default(),
            hidden_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub body: MessageBody,
    pub sent_at: DateTime<Utc>,
}

impl LastMessage {
    pub fn to_summary(&self) -> LastMessageSummary {
        LastMessageSummary {
            message_id: self.message_id,
            sender_id: self.sender_id,
            content: self.body.content().to_string(),
            encrypted_content: self.body.encrypted_content().map(str::to_string),
            iv: self.body.iv().map(str::to_string),
            sent_at: self.sent_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: [Participant; 2],
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, first: UserId, second: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            participants: [Participant::new(first), Participant::new(second)],
            last_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Canonical ordering of a user pair, used as the uniqueness key.
    pub fn pair_key(a: UserId, b: UserId) -> (UserId, UserId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn slot_of(&self, user_id: UserId) -> Option<usize> {
        self.participants.iter().position(|p| p.user_id == user_id)
    }

    pub fn includes(&self, user_id: UserId) -> bool {
        self.slot_of(user_id).is_some()
    }

    pub fn participant(&self, user_id: UserId) -> Option<&Participant> {
        self.slot_of(user_id).map(|slot| &self.participants[slot])
    }

    pub fn participant_mut(&mut self, user_id: UserId) -> Option<&mut Participant> {
        self.slot_of(user_id)
            .map(move |slot| &mut self.participants[slot])
    }

    pub fn other_participant(&self, user_id: UserId) -> Option<&Participant> {
        self.slot_of(user_id).map(|slot| &self.participants[1 - slot])
    }

    /// Listed for `user_id` only once a message exists and, if the user
    /// deleted the conversation, only once a newer message arrived.
    pub fn is_listed_for(&self, user_id: UserId) -> bool {
        let Some(last) = &self.last_message else {
            return false;
        };
        match self.participant(user_id) {
            Some(p) => p.hidden_at.is_none_or(|hidden| last.sent_at > hidden),
            None => false,
        }
    }

    /// Render the conversation from `viewer`'s perspective at time `now`.
    pub fn view_for(&self, viewer: UserId, now: DateTime<Utc>) -> Option<ConversationResponse> {
        let me = self.participant(viewer)?;
        let other = self.other_participant(viewer)?;
        Some(ConversationResponse {
            id: self.id,
            other_user_id: other.user_id,
            last_message: self.last_message.as_ref().map(LastMessage::to_summary),
            unread_count: me.unread,
            is_typing: other.typing.is_active_at(now),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
