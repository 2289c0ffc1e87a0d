//! Persistence seams. Each aggregate gets its own trait so services only
//! depend on what they touch; [`Store`] bundles them for the application
//! state. Backends: [`postgres::PgStore`] and [`memory::MemoryStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::api::message::MessageStatus;
use courier_shared::ids::{ConversationId, MessageId, ReactionId, SessionId, UserId};

use crate::models::{
    Conversation, ConversationKey, ConversationSession, IdentityKey, Message, MessageBody,
    MessageEditRecord, MessageReaction, NewPreKey, Pin, PreKey, SessionUpdate, SignedPreKey,
    StarredMessage, Toggle,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Keyset position in a conversation's history, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    pub created_at: DateTime<Utc>,
    pub id: MessageId,
}

/// Where a text search looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Every conversation the viewer participates in.
    AllConversations,
    Conversation(ConversationId),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_conversation_by_pair(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Conversation>>;

    /// Insert unless a conversation for the same unordered pair exists.
    /// Returns `None` when the pair was already taken.
    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> StoreResult<Option<Conversation>>;

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Option<Conversation>>;

    /// Conversations listed for `user_id`, most recent activity first.
    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Conversation>>;

    /// Returns `false` when the conversation or participant does not exist.
    async fn signal_typing(
        &self,
        id: ConversationId,
        user_id: UserId,
        is_typing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn reset_unread(&self, id: ConversationId, user_id: UserId) -> StoreResult<bool>;

    async fn total_unread(&self, user_id: UserId) -> StoreResult<i64>;

    /// Hide the conversation for one participant and clear their unread count.
    async fn hide_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message, make it the conversation's last message and
    /// bump the recipient's unread count, as one unit.
    async fn append_message(&self, message: &Message, recipient: UserId) -> StoreResult<()>;

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>>;

    async fn get_messages(&self, ids: &[MessageId]) -> StoreResult<Vec<Message>>;

    /// Forward-only status change. Returns the message as stored afterwards,
    /// which is unchanged when the requested status was not ahead.
    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>>;

    /// Mark every message in the conversation not sent by `reader` as read.
    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn edit_message(
        &self,
        id: MessageId,
        body: &MessageBody,
        edited_by: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>>;

    async fn edit_history(&self, id: MessageId) -> StoreResult<Vec<MessageEditRecord>>;

    async fn set_pin(
        &self,
        id: MessageId,
        pin: Option<Pin>,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>>;

    /// Per-user soft delete. Repeating it is a no-op.
    async fn hide_message(&self, id: MessageId, user_id: UserId, at: DateTime<Utc>)
        -> StoreResult<()>;

    async fn is_message_hidden(&self, id: MessageId, user_id: UserId) -> StoreResult<bool>;

    /// Newest first, skipping messages `viewer` deleted for themselves.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<Message>>;

    async fn list_pinned(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> StoreResult<Vec<Message>>;

    /// Case-insensitive substring match on plaintext content. Encrypted
    /// messages never match.
    async fn search_messages(
        &self,
        scope: SearchScope,
        viewer: UserId,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>>;
}

#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Atomically add `reaction` or, if the user already reacted to the
    /// message with any emoji, remove the existing one instead.
    async fn toggle_reaction(
        &self,
        reaction: &MessageReaction,
    ) -> StoreResult<Toggle<MessageReaction>>;

    async fn delete_reaction(&self, id: ReactionId, user_id: UserId) -> StoreResult<bool>;

    async fn delete_user_reaction(&self, message_id: MessageId, user_id: UserId)
        -> StoreResult<bool>;

    async fn reactions_for_messages(
        &self,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageReaction>>;

    /// Returns `false` when the star already existed.
    async fn insert_star(&self, star: &StarredMessage) -> StoreResult<bool>;

    async fn delete_star(&self, message_id: MessageId, user_id: UserId) -> StoreResult<bool>;

    async fn toggle_star(&self, star: &StarredMessage) -> StoreResult<Toggle<StarredMessage>>;

    /// Which of `message_ids` the user has starred.
    async fn starred_among(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageId>>;

    /// The user's stars on messages they have not deleted for themselves,
    /// most recently starred first.
    async fn list_stars(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<StarredMessage>>;
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn upsert_identity_key(
        &self,
        user_id: UserId,
        public_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<IdentityKey>;

    async fn get_identity_key(&self, user_id: UserId) -> StoreResult<Option<IdentityKey>>;

    /// Insert the batch, skipping key ids the user already uploaded.
    /// Returns how many rows were new.
    async fn insert_pre_keys(
        &self,
        user_id: UserId,
        keys: &[NewPreKey],
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn count_available_pre_keys(&self, user_id: UserId) -> StoreResult<i64>;

    /// Claim the oldest unused pre-key. A key is handed out at most once,
    /// even under concurrent claims.
    async fn claim_pre_key(&self, user_id: UserId, at: DateTime<Utc>)
        -> StoreResult<Option<PreKey>>;

    /// Make `key` the user's only active signed pre-key, retiring the
    /// previous one.
    async fn replace_signed_pre_key(&self, key: &SignedPreKey) -> StoreResult<SignedPreKey>;

    async fn active_signed_pre_key(&self, user_id: UserId) -> StoreResult<Option<SignedPreKey>>;

    /// Lookup by key id, including retired keys not yet purged.
    async fn find_signed_pre_key(
        &self,
        user_id: UserId,
        key_id: u32,
    ) -> StoreResult<Option<SignedPreKey>>;

    async fn purge_retired_signed_pre_keys(&self, retired_before: DateTime<Utc>)
        -> StoreResult<u64>;

    /// Update the unrevoked key for this version, or insert a new one.
    async fn upsert_conversation_key(&self, key: &ConversationKey)
        -> StoreResult<ConversationKey>;

    /// Highest unrevoked version.
    async fn latest_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> StoreResult<Option<ConversationKey>>;

    async fn revoke_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        version: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert unless the conversation already has a session; returns
    /// whichever session exists afterwards.
    async fn create_session_if_absent(
        &self,
        session: &ConversationSession,
    ) -> StoreResult<ConversationSession>;

    async fn get_session(&self, id: SessionId) -> StoreResult<Option<ConversationSession>>;

    async fn session_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreResult<Option<ConversationSession>>;

    /// Replace the ratchet state unless the stored message number is ahead.
    async fn update_session_state(
        &self,
        id: SessionId,
        ratchet_state: &str,
        message_number: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<SessionUpdate>;

    async fn delete_sessions_idle_since(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait Store:
    ConversationStore + MessageStore + EngagementStore + KeyStore + SessionStore
{
    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;
}
