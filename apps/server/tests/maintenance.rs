use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use courier_server::clock::ManualClock;
use courier_server::config::MaintenanceConfig;
use courier_server::models::{
    Conversation, ConversationKey, ConversationSession, IdentityKey, Message, MessageBody,
    MessageEditRecord, MessageReaction, NewPreKey, Pin, PreKey, SessionUpdate, SignedPreKey,
    StarredMessage, Toggle,
};
use courier_server::services::Services;
use courier_server::store::memory::MemoryStore;
use courier_server::store::{
    ConversationStore, EngagementStore, HistoryCursor, KeyStore, MessageStore, SearchScope,
    SessionStore, Store, StoreResult,
};
use courier_server::tasks::cleanup::run_maintenance;
use courier_shared::api::message::MessageStatus;
use courier_shared::ids::{ConversationId, MessageId, ReactionId, SessionId, UserId};

/// Memory store whose bulk maintenance deletes take `delay` to finish.
struct SlowMaintenanceStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl ConversationStore for SlowMaintenanceStore {
    async fn find_conversation_by_pair(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Conversation>> {
        self.inner.find_conversation_by_pair(a, b).await
    }

    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> StoreResult<Option<Conversation>> {
        self.inner.insert_conversation_if_absent(conversation).await
    }

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Option<Conversation>> {
        self.inner.get_conversation(id).await
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Conversation>> {
        self.inner.list_conversations(user_id, limit, offset).await
    }

    async fn signal_typing(
        &self,
        id: ConversationId,
        user_id: UserId,
        is_typing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.signal_typing(id, user_id, is_typing, at).await
    }

    async fn reset_unread(&self, id: ConversationId, user_id: UserId) -> StoreResult<bool> {
        self.inner.reset_unread(id, user_id).await
    }

    async fn total_unread(&self, user_id: UserId) -> StoreResult<i64> {
        self.inner.total_unread(user_id).await
    }

    async fn hide_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.hide_conversation(id, user_id, at).await
    }
}

#[async_trait]
impl MessageStore for SlowMaintenanceStore {
    async fn append_message(&self, message: &Message, recipient: UserId) -> StoreResult<()> {
        self.inner.append_message(message, recipient).await
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        self.inner.get_message(id).await
    }

    async fn get_messages(&self, ids: &[MessageId]) -> StoreResult<Vec<Message>> {
        self.inner.get_messages(ids).await
    }

    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        self.inner.advance_status(id, status, at).await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.inner
            .mark_conversation_read(conversation_id, reader, at)
            .await
    }

    async fn edit_message(
        &self,
        id: MessageId,
        body: &MessageBody,
        edited_by: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        self.inner.edit_message(id, body, edited_by, at).await
    }

    async fn edit_history(&self, id: MessageId) -> StoreResult<Vec<MessageEditRecord>> {
        self.inner.edit_history(id).await
    }

    async fn set_pin(
        &self,
        id: MessageId,
        pin: Option<Pin>,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        self.inner.set_pin(id, pin, at).await
    }

    async fn hide_message(
        &self,
        id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner.hide_message(id, user_id, at).await
    }

    async fn is_message_hidden(&self, id: MessageId, user_id: UserId) -> StoreResult<bool> {
        self.inner.is_message_hidden(id, user_id).await
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        self.inner
            .list_messages(conversation_id, viewer, before, limit)
            .await
    }

    async fn list_pinned(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> StoreResult<Vec<Message>> {
        self.inner.list_pinned(conversation_id, viewer).await
    }

    async fn search_messages(
        &self,
        scope: SearchScope,
        viewer: UserId,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>> {
        self.inner
            .search_messages(scope, viewer, query, limit, offset)
            .await
    }
}

#[async_trait]
impl EngagementStore for SlowMaintenanceStore {
    async fn toggle_reaction(
        &self,
        reaction: &MessageReaction,
    ) -> StoreResult<Toggle<MessageReaction>> {
        self.inner.toggle_reaction(reaction).await
    }

    async fn delete_reaction(&self, id: ReactionId, user_id: UserId) -> StoreResult<bool> {
        self.inner.delete_reaction(id, user_id).await
    }

    async fn delete_user_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> StoreResult<bool> {
        self.inner.delete_user_reaction(message_id, user_id).await
    }

    async fn reactions_for_messages(
        &self,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageReaction>> {
        self.inner.reactions_for_messages(message_ids).await
    }

    async fn insert_star(&self, star: &StarredMessage) -> StoreResult<bool> {
        self.inner.insert_star(star).await
    }

    async fn delete_star(&self, message_id: MessageId, user_id: UserId) -> StoreResult<bool> {
        self.inner.delete_star(message_id, user_id).await
    }

    async fn toggle_star(&self, star: &StarredMessage) -> StoreResult<Toggle<StarredMessage>> {
        self.inner.toggle_star(star).await
    }

    async fn starred_among(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageId>> {
        self.inner.starred_among(user_id, message_ids).await
    }

    async fn list_stars(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<StarredMessage>> {
        self.inner.list_stars(user_id, limit, offset).await
    }
}

#[async_trait]
impl KeyStore for SlowMaintenanceStore {
    async fn upsert_identity_key(
        &self,
        user_id: UserId,
        public_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<IdentityKey> {
        self.inner.upsert_identity_key(user_id, public_key, at).await
    }

    async fn get_identity_key(&self, user_id: UserId) -> StoreResult<Option<IdentityKey>> {
        self.inner.get_identity_key(user_id).await
    }

    async fn insert_pre_keys(
        &self,
        user_id: UserId,
        keys: &[NewPreKey],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.inner.insert_pre_keys(user_id, keys, at).await
    }

    async fn count_available_pre_keys(&self, user_id: UserId) -> StoreResult<i64> {
        self.inner.count_available_pre_keys(user_id).await
    }

    async fn claim_pre_key(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<PreKey>> {
        self.inner.claim_pre_key(user_id, at).await
    }

    async fn replace_signed_pre_key(&self, key: &SignedPreKey) -> StoreResult<SignedPreKey> {
        self.inner.replace_signed_pre_key(key).await
    }

    async fn active_signed_pre_key(&self, user_id: UserId) -> StoreResult<Option<SignedPreKey>> {
        self.inner.active_signed_pre_key(user_id).await
    }

    async fn find_signed_pre_key(
        &self,
        user_id: UserId,
        key_id: u32,
    ) -> StoreResult<Option<SignedPreKey>> {
        self.inner.find_signed_pre_key(user_id, key_id).await
    }

    async fn purge_retired_signed_pre_keys(
        &self,
        retired_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .purge_retired_signed_pre_keys(retired_before)
            .await
    }

    async fn upsert_conversation_key(
        &self,
        key: &ConversationKey,
    ) -> StoreResult<ConversationKey> {
        self.inner.upsert_conversation_key(key).await
    }

    async fn latest_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> StoreResult<Option<ConversationKey>> {
        self.inner
            .latest_conversation_key(conversation_id, user_id)
            .await
    }

    async fn revoke_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        version: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner
            .revoke_conversation_key(conversation_id, user_id, version, at)
            .await
    }
}

#[async_trait]
impl SessionStore for SlowMaintenanceStore {
    async fn create_session_if_absent(
        &self,
        session: &ConversationSession,
    ) -> StoreResult<ConversationSession> {
        self.inner.create_session_if_absent(session).await
    }

    async fn get_session(&self, id: SessionId) -> StoreResult<Option<ConversationSession>> {
        self.inner.get_session(id).await
    }

    async fn session_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreResult<Option<ConversationSession>> {
        self.inner.session_for_conversation(conversation_id).await
    }

    async fn update_session_state(
        &self,
        id: SessionId,
        ratchet_state: &str,
        message_number: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<SessionUpdate> {
        self.inner
            .update_session_state(id, ratchet_state, message_number, at)
            .await
    }

    async fn delete_sessions_idle_since(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_sessions_idle_since(cutoff).await
    }
}

#[async_trait]
impl Store for SlowMaintenanceStore {
    async fn ping(&self) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.ping().await
    }
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[tokio::test]
async fn test_maintenance_outlasts_request_deadline() {
    let memory = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let seed = Services::new(memory.clone(), clock.clone(), Duration::from_secs(15));

    let (alice, bob) = (UserId::new(), UserId::new());
    let (conversation, _) = seed.conversations.get_or_create(alice, bob).await.unwrap();
    seed.sessions
        .create_session(conversation.id, alice, bob)
        .await
        .unwrap();
    seed.keys
        .upload_signed_pre_key(alice, 1, &b64(&[1; 32]), &b64(&[2; 64]))
        .await
        .unwrap();
    seed.keys
        .upload_signed_pre_key(alice, 2, &b64(&[3; 32]), &b64(&[4; 64]))
        .await
        .unwrap();
    clock.advance(chrono::Duration::days(91));

    let slow = Services::new(
        Arc::new(SlowMaintenanceStore {
            inner: memory.clone(),
            delay: Duration::from_millis(50),
        }),
        clock.clone(),
        Duration::from_millis(10),
    );
    let report = run_maintenance(&slow, clock.as_ref(), &MaintenanceConfig::default())
        .await
        .unwrap();
    assert_eq!(report.sessions_deleted, 1);
    assert_eq!(report.signed_pre_keys_purged, 1);
    assert!(memory
        .session_for_conversation(conversation.id)
        .await
        .unwrap()
        .is_none());
}
