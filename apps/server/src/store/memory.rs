//! In-process store backed by [`DashMap`]s. Used for tests, local
//! development and single-node deployments that can afford to lose state on
//! restart. Check-then-act sequences go through the entry API so they hold
//! the shard lock for the whole operation.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_shared::api::message::MessageStatus;
use courier_shared::ids::{ConversationId, MessageId, ReactionId, SessionId, UserId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{
    ConversationStore, EngagementStore, HistoryCursor, KeyStore, MessageStore, SearchScope,
    SessionStore, Store, StoreError, StoreResult,
};
use crate::models::{
    Conversation, ConversationKey, ConversationSession, IdentityKey, Message, MessageBody,
    MessageEditRecord, MessageReaction, NewPreKey, Pin, PreKey, SessionUpdate, SignedPreKey,
    StarredMessage, Toggle,
};

#[derive(Default)]
pub struct MemoryStore {
    conversations: DashMap<ConversationId, Conversation>,
    pairs: DashMap<(UserId, UserId), ConversationId>,
    messages: DashMap<MessageId, Message>,
    hidden_messages: DashMap<(MessageId, UserId), DateTime<Utc>>,
    edits: DashMap<MessageId, Vec<MessageEditRecord>>,
    reactions: DashMap<(MessageId, UserId), MessageReaction>,
    stars: DashMap<(MessageId, UserId), StarredMessage>,
    identity_keys: DashMap<UserId, IdentityKey>,
    pre_keys: DashMap<UserId, Vec<PreKey>>,
    signed_pre_keys: DashMap<UserId, Vec<SignedPreKey>>,
    conversation_keys: DashMap<(ConversationId, UserId), Vec<ConversationKey>>,
    sessions: DashMap<SessionId, ConversationSession>,
    sessions_by_conversation: DashMap<ConversationId, SessionId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_hidden(&self, id: MessageId, user_id: UserId) -> bool {
        self.hidden_messages.contains_key(&(id, user_id))
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

fn newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_conversation_by_pair(
        &self,
        a: UserId,
        b: UserId,
    ) -> StoreResult<Option<Conversation>> {
        let id = match self.pairs.get(&Conversation::pair_key(a, b)) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.conversations.get(&id).map(|c| c.clone()))
    }

    async fn insert_conversation_if_absent(
        &self,
        conversation: &Conversation,
    ) -> StoreResult<Option<Conversation>> {
        let [first, second] = &conversation.participants;
        match self
            .pairs
            .entry(Conversation::pair_key(first.user_id, second.user_id))
        {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                self.conversations
                    .insert(conversation.id, conversation.clone());
                slot.insert(conversation.id);
                Ok(Some(conversation.clone()))
            }
        }
    }

    async fn get_conversation(&self, id: ConversationId) -> StoreResult<Option<Conversation>> {
        Ok(self.conversations.get(&id).map(|c| c.clone()))
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Conversation>> {
        let mut listed: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.is_listed_for(user_id))
            .map(|c| c.clone())
            .collect();
        listed.sort_by(|a, b| {
            let a_at = a.last_message.as_ref().map(|m| m.sent_at);
            let b_at = b.last_message.as_ref().map(|m| m.sent_at);
            b_at.cmp(&a_at).then_with(|| b.id.cmp(&a.id))
        });
        Ok(page(listed, limit, offset))
    }

    async fn signal_typing(
        &self,
        id: ConversationId,
        user_id: UserId,
        is_typing: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let Some(mut conv) = self.conversations.get_mut(&id) else {
            return Ok(false);
        };
        match conv.participant_mut(user_id) {
            Some(p) => {
                p.typing = p.typing.signal(is_typing, at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reset_unread(&self, id: ConversationId, user_id: UserId) -> StoreResult<bool> {
        let Some(mut conv) = self.conversations.get_mut(&id) else {
            return Ok(false);
        };
        match conv.participant_mut(user_id) {
            Some(p) => {
                p.unread = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn total_unread(&self, user_id: UserId) -> StoreResult<i64> {
        Ok(self
            .conversations
            .iter()
            .filter_map(|c| c.participant(user_id).map(|p| p.unread))
            .sum())
    }

    async fn hide_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let Some(mut conv) = self.conversations.get_mut(&id) else {
            return Ok(false);
        };
        match conv.participant_mut(user_id) {
            Some(p) => {
                p.hidden_at = Some(at);
                p.unread = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append_message(&self, message: &Message, recipient: UserId) -> StoreResult<()> {
        let Some(mut conv) = self.conversations.get_mut(&message.conversation_id) else {
            return Err(StoreError::Corrupt(format!(
                "conversation {} missing for message {}",
                message.conversation_id, message.id
            )));
        };
        self.messages.insert(message.id, message.clone());
        let newer = conv
            .last_message
            .as_ref()
            .is_none_or(|last| last.sent_at <= message.created_at);
        if newer {
            conv.last_message = Some(message.to_last_message());
            conv.updated_at = message.created_at;
        }
        if let Some(p) = conv.participant_mut(recipient) {
            p.unread += 1;
        }
        Ok(())
    }

    async fn get_message(&self, id: MessageId) -> StoreResult<Option<Message>> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn get_messages(&self, ids: &[MessageId]) -> StoreResult<Vec<Message>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.messages.get(id).map(|m| m.clone()))
            .collect())
    }

    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        Ok(self.messages.get_mut(&id).map(|mut m| {
            m.advance_status(status, at);
            m.clone()
        }))
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut updated = 0;
        for mut m in self.messages.iter_mut() {
            if m.conversation_id == conversation_id
                && m.sender_id != reader
                && m.advance_status(MessageStatus::Read, at)
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn edit_message(
        &self,
        id: MessageId,
        body: &MessageBody,
        edited_by: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        let (record, edited) = {
            let Some(mut m) = self.messages.get_mut(&id) else {
                return Ok(None);
            };
            let record = m.apply_edit(body.clone(), edited_by, at);
            (record, m.clone())
        };
        self.edits.entry(id).or_default().push(record);
        Ok(Some(edited))
    }

    async fn edit_history(&self, id: MessageId) -> StoreResult<Vec<MessageEditRecord>> {
        Ok(self.edits.get(&id).map(|e| e.clone()).unwrap_or_default())
    }

    async fn set_pin(
        &self,
        id: MessageId,
        pin: Option<Pin>,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Message>> {
        Ok(self.messages.get_mut(&id).map(|mut m| {
            m.pin = pin;
            m.updated_at = at;
            m.clone()
        }))
    }

    async fn hide_message(
        &self,
        id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.hidden_messages.entry((id, user_id)).or_insert(at);
        Ok(())
    }

    async fn is_message_hidden(&self, id: MessageId, user_id: UserId) -> StoreResult<bool> {
        Ok(self.is_hidden(id, user_id))
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let mut found: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| !self.is_hidden(m.id, viewer))
            .filter(|m| before.is_none_or(|c| (m.created_at, m.id) < (c.created_at, c.id)))
            .map(|m| m.clone())
            .collect();
        newest_first(&mut found);
        Ok(page(found, limit, 0))
    }

    async fn list_pinned(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> StoreResult<Vec<Message>> {
        let mut pinned: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.pin.is_some())
            .filter(|m| !self.is_hidden(m.id, viewer))
            .map(|m| m.clone())
            .collect();
        pinned.sort_by(|a, b| {
            let a_key = (a.pin.map(|p| p.pinned_at), a.id);
            let b_key = (b.pin.map(|p| p.pinned_at), b.id);
            b_key.cmp(&a_key)
        });
        Ok(pinned)
    }

    async fn search_messages(
        &self,
        scope: SearchScope,
        viewer: UserId,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>> {
        let conversations: HashSet<ConversationId> = match scope {
            SearchScope::Conversation(id) => HashSet::from([id]),
            SearchScope::AllConversations => self
                .conversations
                .iter()
                .filter(|c| c.includes(viewer))
                .map(|c| c.id)
                .collect(),
        };
        let needle = query.to_lowercase();
        let mut found: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| conversations.contains(&m.conversation_id))
            .filter(|m| match &m.body {
                MessageBody::Plain { content } => content.to_lowercase().contains(&needle),
                MessageBody::Encrypted { .. } => false,
            })
            .filter(|m| !self.is_hidden(m.id, viewer))
            .map(|m| m.clone())
            .collect();
        newest_first(&mut found);
        Ok(page(found, limit, offset))
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn toggle_reaction(
        &self,
        reaction: &MessageReaction,
    ) -> StoreResult<Toggle<MessageReaction>> {
        match self.reactions.entry((reaction.message_id, reaction.user_id)) {
            Entry::Occupied(existing) => Ok(Toggle::Removed(existing.remove())),
            Entry::Vacant(slot) => {
                slot.insert(reaction.clone());
                Ok(Toggle::Added(reaction.clone()))
            }
        }
    }

    async fn delete_reaction(&self, id: ReactionId, user_id: UserId) -> StoreResult<bool> {
        let key = self
            .reactions
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .map(|r| *r.key());
        Ok(match key {
            Some(key) => self.reactions.remove_if(&key, |_, r| r.id == id).is_some(),
            None => false,
        })
    }

    async fn delete_user_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> StoreResult<bool> {
        Ok(self.reactions.remove(&(message_id, user_id)).is_some())
    }

    async fn reactions_for_messages(
        &self,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageReaction>> {
        let wanted: HashSet<&MessageId> = message_ids.iter().collect();
        let mut found: Vec<MessageReaction> = self
            .reactions
            .iter()
            .filter(|r| wanted.contains(&r.message_id))
            .map(|r| r.clone())
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn insert_star(&self, star: &StarredMessage) -> StoreResult<bool> {
        match self.stars.entry((star.message_id, star.user_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(star.clone());
                Ok(true)
            }
        }
    }

    async fn delete_star(&self, message_id: MessageId, user_id: UserId) -> StoreResult<bool> {
        Ok(self.stars.remove(&(message_id, user_id)).is_some())
    }

    async fn toggle_star(&self, star: &StarredMessage) -> StoreResult<Toggle<StarredMessage>> {
        match self.stars.entry((star.message_id, star.user_id)) {
            Entry::Occupied(existing) => Ok(Toggle::Removed(existing.remove())),
            Entry::Vacant(slot) => {
                slot.insert(star.clone());
                Ok(Toggle::Added(star.clone()))
            }
        }
    }

    async fn starred_among(
        &self,
        user_id: UserId,
        message_ids: &[MessageId],
    ) -> StoreResult<Vec<MessageId>> {
        Ok(message_ids
            .iter()
            .filter(|id| self.stars.contains_key(&(**id, user_id)))
            .copied()
            .collect())
    }

    async fn list_stars(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<StarredMessage>> {
        let mut stars: Vec<StarredMessage> = self
            .stars
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter(|s| self.messages.contains_key(&s.message_id))
            .filter(|s| !self.is_hidden(s.message_id, user_id))
            .map(|s| s.clone())
            .collect();
        stars.sort_by(|a, b| (b.created_at, b.message_id).cmp(&(a.created_at, a.message_id)));
        Ok(page(stars, limit, offset))
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn upsert_identity_key(
        &self,
        user_id: UserId,
        public_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<IdentityKey> {
        let key = match self.identity_keys.entry(user_id) {
            Entry::Occupied(mut existing) => {
                let key = existing.get_mut();
                key.public_key = public_key.to_string();
                key.updated_at = at;
                key.clone()
            }
            Entry::Vacant(slot) => slot
                .insert(IdentityKey {
                    user_id,
                    public_key: public_key.to_string(),
                    created_at: at,
                    updated_at: at,
                })
                .clone(),
        };
        Ok(key)
    }

    async fn get_identity_key(&self, user_id: UserId) -> StoreResult<Option<IdentityKey>> {
        Ok(self.identity_keys.get(&user_id).map(|k| k.clone()))
    }

    async fn insert_pre_keys(
        &self,
        user_id: UserId,
        keys: &[NewPreKey],
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut stored = self.pre_keys.entry(user_id).or_default();
        let mut accepted = 0;
        for key in keys {
            if stored.iter().any(|k| k.key_id == key.key_id) {
                continue;
            }
            stored.push(PreKey {
                user_id,
                key_id: key.key_id,
                public_key: key.public_key.clone(),
                is_used: false,
                created_at: at,
                used_at: None,
            });
            accepted += 1;
        }
        Ok(accepted)
    }

    async fn count_available_pre_keys(&self, user_id: UserId) -> StoreResult<i64> {
        let available = self
            .pre_keys
            .get(&user_id)
            .map(|keys| keys.iter().filter(|k| !k.is_used).count())
            .unwrap_or(0);
        Ok(available as i64)
    }

    async fn claim_pre_key(
        &self,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<PreKey>> {
        let Some(mut keys) = self.pre_keys.get_mut(&user_id) else {
            return Ok(None);
        };
        let claimed = keys
            .iter_mut()
            .filter(|k| !k.is_used)
            .min_by_key(|k| (k.created_at, k.key_id))
            .map(|k| {
                k.is_used = true;
                k.used_at = Some(at);
                k.clone()
            });
        Ok(claimed)
    }

    async fn replace_signed_pre_key(&self, key: &SignedPreKey) -> StoreResult<SignedPreKey> {
        let mut keys = self.signed_pre_keys.entry(key.user_id).or_default();
        for existing in keys.iter_mut().filter(|k| k.is_active) {
            existing.is_active = false;
            existing.retired_at = Some(key.created_at);
        }
        let mut active = key.clone();
        active.is_active = true;
        active.retired_at = None;
        match keys.iter_mut().find(|k| k.key_id == key.key_id) {
            Some(slot) => *slot = active.clone(),
            None => keys.push(active.clone()),
        }
        Ok(active)
    }

    async fn active_signed_pre_key(&self, user_id: UserId) -> StoreResult<Option<SignedPreKey>> {
        Ok(self
            .signed_pre_keys
            .get(&user_id)
            .and_then(|keys| keys.iter().find(|k| k.is_active).cloned()))
    }

    async fn find_signed_pre_key(
        &self,
        user_id: UserId,
        key_id: u32,
    ) -> StoreResult<Option<SignedPreKey>> {
        Ok(self
            .signed_pre_keys
            .get(&user_id)
            .and_then(|keys| keys.iter().find(|k| k.key_id == key_id).cloned()))
    }

    async fn purge_retired_signed_pre_keys(
        &self,
        retired_before: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut purged = 0;
        for mut keys in self.signed_pre_keys.iter_mut() {
            let before = keys.len();
            keys.retain(|k| k.is_active || k.retired_at.is_none_or(|at| at >= retired_before));
            purged += (before - keys.len()) as u64;
        }
        Ok(purged)
    }

    async fn upsert_conversation_key(
        &self,
        key: &ConversationKey,
    ) -> StoreResult<ConversationKey> {
        let mut keys = self
            .conversation_keys
            .entry((key.conversation_id, key.user_id))
            .or_default();
        let stored = match keys
            .iter_mut()
            .find(|k| k.version == key.version && !k.is_revoked)
        {
            Some(existing) => {
                existing.public_key = key.public_key.clone();
                existing.updated_at = key.updated_at;
                existing.clone()
            }
            None => {
                keys.push(key.clone());
                key.clone()
            }
        };
        Ok(stored)
    }

    async fn latest_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> StoreResult<Option<ConversationKey>> {
        Ok(self
            .conversation_keys
            .get(&(conversation_id, user_id))
            .and_then(|keys| {
                keys.iter()
                    .filter(|k| !k.is_revoked)
                    .max_by_key(|k| k.version)
                    .cloned()
            }))
    }

    async fn revoke_conversation_key(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        version: i32,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let Some(mut keys) = self.conversation_keys.get_mut(&(conversation_id, user_id)) else {
            return Ok(false);
        };
        match keys
            .iter_mut()
            .find(|k| k.version == version && !k.is_revoked)
        {
            Some(key) => {
                key.is_revoked = true;
                key.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session_if_absent(
        &self,
        session: &ConversationSession,
    ) -> StoreResult<ConversationSession> {
        match self.sessions_by_conversation.entry(session.conversation_id) {
            Entry::Occupied(mut existing) => {
                if let Some(current) = self.sessions.get(existing.get()) {
                    return Ok(current.clone());
                }
                // Cleanup removed the session but not yet its index entry.
                self.sessions.insert(session.id, session.clone());
                existing.insert(session.id);
                Ok(session.clone())
            }
            Entry::Vacant(slot) => {
                self.sessions.insert(session.id, session.clone());
                slot.insert(session.id);
                Ok(session.clone())
            }
        }
    }

    async fn get_session(&self, id: SessionId) -> StoreResult<Option<ConversationSession>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn session_for_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> StoreResult<Option<ConversationSession>> {
        let id = match self.sessions_by_conversation.get(&conversation_id) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn update_session_state(
        &self,
        id: SessionId,
        ratchet_state: &str,
        message_number: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<SessionUpdate> {
        let Some(mut session) = self.sessions.get_mut(&id) else {
            return Ok(SessionUpdate::NotFound);
        };
        if message_number < session.message_number {
            return Ok(SessionUpdate::Stale {
                current: session.message_number,
            });
        }
        session.ratchet_state = ratchet_state.to_string();
        session.message_number = message_number;
        session.updated_at = at;
        Ok(SessionUpdate::Updated(session.clone()))
    }

    async fn delete_sessions_idle_since(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let idle: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|s| s.updated_at < cutoff)
            .map(|s| s.id)
            .collect();
        let mut deleted = 0;
        for id in idle {
            if let Some((_, session)) = self.sessions.remove_if(&id, |_, s| s.updated_at < cutoff)
            {
                self.sessions_by_conversation
                    .remove_if(&session.conversation_id, |_, sid| *sid == id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
