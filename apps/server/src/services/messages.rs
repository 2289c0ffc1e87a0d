use std::collections::{HashMap, HashSet};

use courier_shared::api::message::{EditMessageRequest, MessageStatus, SendMessageRequest};
use courier_shared::error::CourierError;
use courier_shared::ids::{ConversationId, MessageId, UserId};

use super::{ConversationService, ServiceContext};
use crate::models::{
    Conversation, Message, MessageBody, MessageEditRecord, MessageKind, MessageReaction,
    MessageView, Pin,
};
use crate::pagination::Page;
use crate::store::{HistoryCursor, SearchScope};
use crate::validation::validate_search_query;

/// A validated message awaiting persistence.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub body: MessageBody,
    pub kind: MessageKind,
    pub reply_to_id: Option<MessageId>,
}

impl NewMessage {
    pub fn from_request(req: SendMessageRequest) -> Result<Self, CourierError> {
        let body = MessageBody::from_parts(req.content, req.encrypted_content, req.iv)?;
        let kind = MessageKind::from_parts(req.message_type, req.attachment)?;
        if kind == MessageKind::Text && body.is_blank() {
            return Err(CourierError::Validation("message content is required".into()));
        }
        Ok(Self {
            body,
            kind,
            reply_to_id: req.reply_to_id,
        })
    }
}

/// One page of history plus the position to continue from.
#[derive(Debug)]
pub struct HistoryPage {
    pub messages: Vec<MessageView>,
    pub next: Option<HistoryCursor>,
}

#[derive(Clone)]
pub struct MessageService {
    ctx: ServiceContext,
    conversations: ConversationService,
}

impl MessageService {
    pub fn new(ctx: ServiceContext, conversations: ConversationService) -> Self {
        Self { ctx, conversations }
    }

    pub async fn create(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        new: NewMessage,
    ) -> Result<MessageView, CourierError> {
        let conversation = self
            .conversations
            .get_for_participant(conversation_id, sender)
            .await?;

        let reply_to = match new.reply_to_id {
            Some(target_id) => {
                let target = self
                    .ctx
                    .call("get_message", self.ctx.store.get_message(target_id))
                    .await?
                    .filter(|m| m.conversation_id == conversation_id)
                    .ok_or_else(|| {
                        CourierError::Validation(
                            "reply_to_id must reference a message in this conversation".into(),
                        )
                    })?;
                Some(target)
            }
            None => None,
        };

        let mut message = Message::new(
            conversation_id,
            sender,
            new.body,
            new.kind,
            self.ctx.now(),
        );
        message.reply_to_id = new.reply_to_id;
        self.append(&conversation, &message).await?;

        Ok(MessageView {
            message,
            reply_to,
            reactions: Vec::new(),
            starred: false,
        })
    }

    async fn append(&self, conversation: &Conversation, message: &Message) -> Result<(), CourierError> {
        let recipient = conversation
            .other_participant(message.sender_id)
            .map(|p| p.user_id)
            .ok_or(CourierError::Forbidden)?;
        self.ctx
            .call(
                "append_message",
                self.ctx.store.append_message(message, recipient),
            )
            .await?;
        tracing::info!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            encrypted = message.body.is_encrypted(),
            "message sent"
        );
        Ok(())
    }

    /// Load a message the user may see: they take part in its conversation
    /// and have not deleted it for themselves.
    pub async fn require_visible(
        &self,
        id: MessageId,
        user_id: UserId,
    ) -> Result<Message, CourierError> {
        let message = self
            .ctx
            .call("get_message", self.ctx.store.get_message(id))
            .await?
            .ok_or(CourierError::NotFound)?;
        self.conversations
            .get_for_participant(message.conversation_id, user_id)
            .await?;
        let hidden = self
            .ctx
            .call(
                "is_message_hidden",
                self.ctx.store.is_message_hidden(id, user_id),
            )
            .await?;
        if hidden {
            return Err(CourierError::NotFound);
        }
        Ok(message)
    }

    pub async fn get(&self, id: MessageId, viewer: UserId) -> Result<MessageView, CourierError> {
        let message = self.require_visible(id, viewer).await?;
        self.enrich_one(viewer, message).await
    }

    /// Forward-only delivery status update by the recipient. Requests that
    /// would move the status backwards leave the message unchanged.
    pub async fn update_status(
        &self,
        id: MessageId,
        caller: UserId,
        status: MessageStatus,
    ) -> Result<MessageView, CourierError> {
        let message = self.require_visible(id, caller).await?;
        if message.sender_id == caller {
            return Err(CourierError::Forbidden);
        }
        let updated = self
            .ctx
            .call(
                "advance_status",
                self.ctx.store.advance_status(id, status, self.ctx.now()),
            )
            .await?
            .ok_or(CourierError::NotFound)?;
        if updated.status != status {
            tracing::debug!(message_id = %id, current = ?updated.status, requested = ?status, "status regression ignored");
        }
        self.enrich_one(caller, updated).await
    }

    /// Mark every message the reader did not send as read. Returns how many
    /// changed.
    pub async fn mark_messages_as_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<u64, CourierError> {
        self.conversations
            .get_for_participant(conversation_id, reader)
            .await?;
        self.ctx
            .call(
                "mark_conversation_read",
                self.ctx
                    .store
                    .mark_conversation_read(conversation_id, reader, self.ctx.now()),
            )
            .await
    }

    pub async fn edit(
        &self,
        id: MessageId,
        editor: UserId,
        req: EditMessageRequest,
    ) -> Result<MessageView, CourierError> {
        let message = self.require_visible(id, editor).await?;
        if message.sender_id != editor {
            return Err(CourierError::Forbidden);
        }
        let body = MessageBody::from_parts(req.content, req.encrypted_content, req.iv)?;
        if message.kind == MessageKind::Text && body.is_blank() {
            return Err(CourierError::Validation("message content is required".into()));
        }
        let edited = self
            .ctx
            .call(
                "edit_message",
                self.ctx
                    .store
                    .edit_message(id, &body, editor, self.ctx.now()),
            )
            .await?
            .ok_or(CourierError::NotFound)?;
        tracing::info!(message_id = %id, edit_count = edited.edit.count, "message edited");
        self.enrich_one(editor, edited).await
    }

    pub async fn edit_history(
        &self,
        id: MessageId,
        viewer: UserId,
    ) -> Result<Vec<MessageEditRecord>, CourierError> {
        self.require_visible(id, viewer).await?;
        self.ctx
            .call("edit_history", self.ctx.store.edit_history(id))
            .await
    }

    pub async fn pin(&self, id: MessageId, user_id: UserId) -> Result<MessageView, CourierError> {
        let pin = Pin {
            pinned_by: user_id,
            pinned_at: self.ctx.now(),
        };
        self.set_pin(id, user_id, Some(pin)).await
    }

    pub async fn unpin(&self, id: MessageId, user_id: UserId) -> Result<MessageView, CourierError> {
        self.set_pin(id, user_id, None).await
    }

    async fn set_pin(
        &self,
        id: MessageId,
        user_id: UserId,
        pin: Option<Pin>,
    ) -> Result<MessageView, CourierError> {
        self.require_visible(id, user_id).await?;
        let updated = self
            .ctx
            .call(
                "set_pin",
                self.ctx.store.set_pin(id, pin, self.ctx.now()),
            )
            .await?
            .ok_or(CourierError::NotFound)?;
        self.enrich_one(user_id, updated).await
    }

    /// Copy a message into another conversation the forwarder belongs to.
    pub async fn forward(
        &self,
        id: MessageId,
        target: ConversationId,
        forwarder: UserId,
    ) -> Result<MessageView, CourierError> {
        let source = self.require_visible(id, forwarder).await?;
        let conversation = self
            .conversations
            .get_for_participant(target, forwarder)
            .await?;
        let mut message = Message::new(
            target,
            forwarder,
            source.body.clone(),
            source.kind.clone(),
            self.ctx.now(),
        );
        message.forwarded_from_id = Some(source.id);
        self.append(&conversation, &message).await?;
        Ok(MessageView::bare(message))
    }

    /// Hide the message from this user only.
    pub async fn delete_for_user(&self, id: MessageId, user_id: UserId) -> Result<(), CourierError> {
        self.require_visible(id, user_id).await?;
        self.ctx
            .call(
                "hide_message",
                self.ctx.store.hide_message(id, user_id, self.ctx.now()),
            )
            .await
    }

    pub async fn history(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        before: Option<HistoryCursor>,
        limit: i64,
    ) -> Result<HistoryPage, CourierError> {
        self.conversations
            .get_for_participant(conversation_id, viewer)
            .await?;
        let mut messages = self
            .ctx
            .call(
                "list_messages",
                self.ctx
                    .store
                    .list_messages(conversation_id, viewer, before, limit + 1),
            )
            .await?;
        let has_more = messages.len() as i64 > limit;
        messages.truncate(limit as usize);
        let next = if has_more {
            messages.last().map(|m| HistoryCursor {
                created_at: m.created_at,
                id: m.id,
            })
        } else {
            None
        };
        Ok(HistoryPage {
            messages: self.enrich(viewer, messages).await?,
            next,
        })
    }

    pub async fn pinned(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<Vec<MessageView>, CourierError> {
        self.conversations
            .get_for_participant(conversation_id, viewer)
            .await?;
        let messages = self
            .ctx
            .call(
                "list_pinned",
                self.ctx.store.list_pinned(conversation_id, viewer),
            )
            .await?;
        self.enrich(viewer, messages).await
    }

    /// Search plaintext messages across every conversation of `viewer`.
    pub async fn search(
        &self,
        viewer: UserId,
        query: &str,
        page: Page,
    ) -> Result<Vec<MessageView>, CourierError> {
        self.run_search(SearchScope::AllConversations, viewer, query, page)
            .await
    }

    pub async fn search_conversation(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
        query: &str,
        page: Page,
    ) -> Result<Vec<MessageView>, CourierError> {
        self.conversations
            .get_for_participant(conversation_id, viewer)
            .await?;
        self.run_search(SearchScope::Conversation(conversation_id), viewer, query, page)
            .await
    }

    async fn run_search(
        &self,
        scope: SearchScope,
        viewer: UserId,
        query: &str,
        page: Page,
    ) -> Result<Vec<MessageView>, CourierError> {
        let query = validate_search_query(query)?;
        let messages = self
            .ctx
            .call(
                "search_messages",
                self.ctx
                    .store
                    .search_messages(scope, viewer, &query, page.limit, page.offset),
            )
            .await?;
        self.enrich(viewer, messages).await
    }

    async fn enrich_one(&self, viewer: UserId, message: Message) -> Result<MessageView, CourierError> {
        self.enrich(viewer, vec![message])
            .await?
            .pop()
            .ok_or_else(|| CourierError::Internal("enrichment dropped a message".into()))
    }

    /// Attach reply previews, reactions and the viewer's stars. The three
    /// lookups are independent and run concurrently.
    pub async fn enrich(
        &self,
        viewer: UserId,
        messages: Vec<Message>,
    ) -> Result<Vec<MessageView>, CourierError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        let reply_ids: Vec<MessageId> = messages
            .iter()
            .filter_map(|m| m.reply_to_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let store = &self.ctx.store;
        let (reactions, starred, replies) = futures::try_join!(
            self.ctx
                .call("reactions_for_messages", store.reactions_for_messages(&ids)),
            self.ctx
                .call("starred_among", store.starred_among(viewer, &ids)),
            self.ctx.call("get_messages", store.get_messages(&reply_ids)),
        )?;

        let mut reactions_by_message: HashMap<MessageId, Vec<MessageReaction>> = HashMap::new();
        for r in reactions {
            reactions_by_message.entry(r.message_id).or_default().push(r);
        }
        let starred: HashSet<MessageId> = starred.into_iter().collect();
        let replies: HashMap<MessageId, Message> =
            replies.into_iter().map(|m| (m.id, m)).collect();

        Ok(messages
            .into_iter()
            .map(|message| MessageView {
                reply_to: message.reply_to_id.and_then(|id| replies.get(&id).cloned()),
                reactions: reactions_by_message.remove(&message.id).unwrap_or_default(),
                starred: starred.contains(&message.id),
                message,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use courier_shared::api::message::{Attachment, MessageType};

    use super::*;
    use crate::services::testing::services;
    use crate::services::Services;

    fn text(content: &str) -> NewMessage {
        NewMessage::from_request(SendMessageRequest {
            content: Some(content.into()),
            ..Default::default()
        })
        .unwrap()
    }

    fn encrypted() -> NewMessage {
        NewMessage::from_request(SendMessageRequest {
            encrypted_content: Some("c2VjcmV0".into()),
            iv: Some("aXYxMjM=".into()),
            ..Default::default()
        })
        .unwrap()
    }

    async fn pair(svc: &Services) -> (ConversationId, UserId, UserId) {
        let (a, b) = (UserId::new(), UserId::new());
        let (conv, _) = svc.conversations.get_or_create(a, b).await.unwrap();
        (conv.id, a, b)
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = NewMessage::from_request(SendMessageRequest {
            content: Some("   ".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[test]
    fn image_without_caption_is_accepted() {
        let msg = NewMessage::from_request(SendMessageRequest {
            message_type: MessageType::Image,
            attachment: Some(Attachment {
                url: "https://cdn.example/cat.png".into(),
                file_name: Some("cat.png".into()),
                mime_type: Some("image/png".into()),
                size_bytes: Some(2048),
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(msg.kind.message_type(), MessageType::Image);
    }

    #[tokio::test]
    async fn send_updates_last_message_and_recipient_unread() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        let sent = svc.messages.create(conv, a, text("hi")).await.unwrap();

        let stored = svc.conversations.get_for_participant(conv, b).await.unwrap();
        let last = stored.last_message.as_ref().unwrap();
        assert_eq!(last.message_id, sent.message.id);
        assert_eq!(last.sender_id, a);
        assert_eq!(stored.participant(b).unwrap().unread, 1);
        assert_eq!(stored.participant(a).unwrap().unread, 0);
        assert_eq!(sent.message.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn outsider_cannot_send() {
        let (svc, _) = services();
        let (conv, _, _) = pair(&svc).await;
        let err = svc.messages.create(conv, UserId::new(), text("x")).await.unwrap_err();
        assert!(matches!(err, CourierError::Forbidden));
    }

    #[tokio::test]
    async fn reply_must_stay_in_conversation() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        let (other_conv, c, _) = pair(&svc).await;
        let foreign = svc.messages.create(other_conv, c, text("elsewhere")).await.unwrap();
        let original = svc.messages.create(conv, b, text("question")).await.unwrap();

        let mut bad = text("answer");
        bad.reply_to_id = Some(foreign.message.id);
        let err = svc.messages.create(conv, a, bad).await.unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));

        let mut good = text("answer");
        good.reply_to_id = Some(original.message.id);
        let reply = svc.messages.create(conv, a, good).await.unwrap();
        let preview = reply.into_response(a).reply_to.unwrap();
        assert_eq!(preview.id, original.message.id);
        assert_eq!(preview.sender_id, b);
    }

    #[tokio::test]
    async fn status_is_forward_only() {
        let (svc, clock) = services();
        let (conv, a, b) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("hi")).await.unwrap().message.id;

        clock.advance(Duration::seconds(1));
        let read = svc.messages.update_status(id, b, MessageStatus::Read).await.unwrap();
        assert_eq!(read.message.status, MessageStatus::Read);
        let read_at = read.message.read_at;
        assert!(read_at.is_some());

        clock.advance(Duration::seconds(1));
        let after = svc.messages.update_status(id, b, MessageStatus::Delivered).await.unwrap();
        assert_eq!(after.message.status, MessageStatus::Read);
        assert_eq!(after.message.read_at, read_at);
    }

    #[tokio::test]
    async fn sender_cannot_acknowledge_own_message() {
        let (svc, _) = services();
        let (conv, a, _) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("hi")).await.unwrap().message.id;
        let err = svc.messages.update_status(id, a, MessageStatus::Read).await.unwrap_err();
        assert!(matches!(err, CourierError::Forbidden));
    }

    #[tokio::test]
    async fn bulk_read_only_touches_incoming_unread_messages() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        svc.messages.create(conv, a, text("1")).await.unwrap();
        svc.messages.create(conv, a, text("2")).await.unwrap();
        let own = svc.messages.create(conv, b, text("mine")).await.unwrap().message.id;

        assert_eq!(svc.messages.mark_messages_as_read(conv, b).await.unwrap(), 2);
        assert_eq!(svc.messages.mark_messages_as_read(conv, b).await.unwrap(), 0);

        let mine = svc.messages.get(own, b).await.unwrap();
        assert_eq!(mine.message.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn edits_keep_original_and_history() {
        let (svc, clock) = services();
        let (conv, a, b) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("v1")).await.unwrap().message.id;

        for next in ["v2", "v3"] {
            clock.advance(Duration::seconds(1));
            svc.messages
                .edit(
                    id,
                    a,
                    EditMessageRequest {
                        content: Some(next.into()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let view = svc.messages.get(id, b).await.unwrap().into_response(b);
        assert_eq!(view.content, "v3");
        assert_eq!(view.original_content.as_deref(), Some("v1"));
        assert_eq!(view.edit_count, 2);

        let history = svc.messages.edit_history(id, b).await.unwrap();
        let previous: Vec<&str> = history.iter().map(|r| r.previous.content()).collect();
        assert_eq!(previous, vec!["v1", "v2"]);
    }

    #[tokio::test]
    async fn only_sender_may_edit() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("mine")).await.unwrap().message.id;
        let err = svc
            .messages
            .edit(
                id,
                b,
                EditMessageRequest {
                    content: Some("hijack".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Forbidden));
    }

    #[tokio::test]
    async fn pin_is_last_writer_wins() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("note")).await.unwrap().message.id;

        svc.messages.pin(id, a).await.unwrap();
        let repinned = svc.messages.pin(id, b).await.unwrap();
        assert_eq!(repinned.message.pin.unwrap().pinned_by, b);
        assert_eq!(svc.messages.pinned(conv, a).await.unwrap().len(), 1);

        svc.messages.unpin(id, a).await.unwrap();
        assert!(svc.messages.pinned(conv, a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pins_at_the_same_instant_order_by_id() {
        let (svc, _) = services();
        let (conv, a, _) = pair(&svc).await;
        let mut ids = Vec::new();
        for body in ["one", "two", "three"] {
            let id = svc.messages.create(conv, a, text(body)).await.unwrap().message.id;
            svc.messages.pin(id, a).await.unwrap();
            ids.push(id);
        }
        ids.sort_by(|x, y| y.cmp(x));

        let first: Vec<MessageId> = svc
            .messages
            .pinned(conv, a)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.message.id)
            .collect();
        assert_eq!(first, ids);
        let again: Vec<MessageId> = svc
            .messages
            .pinned(conv, a)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.message.id)
            .collect();
        assert_eq!(again, first);
    }

    #[tokio::test]
    async fn forward_copies_without_touching_source() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        let (other, _) = svc.conversations.get_or_create(b, UserId::new()).await.unwrap();
        let source = svc.messages.create(conv, a, text("pass it on")).await.unwrap().message;

        let fwd = svc.messages.forward(source.id, other.id, b).await.unwrap().message;
        assert_eq!(fwd.forwarded_from_id, Some(source.id));
        assert!(fwd.is_forwarded());
        assert_eq!(fwd.body, source.body);
        assert_eq!(fwd.status, MessageStatus::Sent);
        assert_eq!(fwd.sender_id, b);

        let unchanged = svc.messages.get(source.id, a).await.unwrap().message;
        assert_eq!(unchanged, source);
    }

    #[tokio::test]
    async fn forward_requires_membership_in_target() {
        let (svc, _) = services();
        let (conv, a, _) = pair(&svc).await;
        let (foreign, _, _) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("x")).await.unwrap().message.id;
        let err = svc.messages.forward(id, foreign, a).await.unwrap_err();
        assert!(matches!(err, CourierError::Forbidden));
    }

    #[tokio::test]
    async fn delete_hides_for_one_user_only() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        let id = svc.messages.create(conv, a, text("oops")).await.unwrap().message.id;

        svc.messages.delete_for_user(id, b).await.unwrap();
        assert!(matches!(
            svc.messages.get(id, b).await.unwrap_err(),
            CourierError::NotFound
        ));
        assert!(svc.messages.get(id, a).await.is_ok());

        let b_history = svc.messages.history(conv, b, None, 50).await.unwrap();
        assert!(b_history.messages.is_empty());
        let a_history = svc.messages.history(conv, a, None, 50).await.unwrap();
        assert_eq!(a_history.messages.len(), 1);
    }

    #[tokio::test]
    async fn history_pages_with_cursor() {
        let (svc, clock) = services();
        let (conv, a, b) = pair(&svc).await;
        for n in 0..5 {
            clock.advance(Duration::seconds(1));
            svc.messages.create(conv, a, text(&format!("m{n}"))).await.unwrap();
        }

        let first = svc.messages.history(conv, b, None, 2).await.unwrap();
        let contents: Vec<&str> = first.messages.iter().map(|v| v.message.body.content()).collect();
        assert_eq!(contents, vec!["m4", "m3"]);
        let cursor = first.next.unwrap();

        let second = svc.messages.history(conv, b, Some(cursor), 2).await.unwrap();
        let contents: Vec<&str> = second.messages.iter().map(|v| v.message.body.content()).collect();
        assert_eq!(contents, vec!["m2", "m1"]);

        let last = svc.messages.history(conv, b, second.next, 2).await.unwrap();
        assert_eq!(last.messages.len(), 1);
        assert!(last.next.is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_skips_encrypted() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        svc.messages.create(conv, a, text("Hello World")).await.unwrap();
        svc.messages.create(conv, a, text("goodbye")).await.unwrap();
        svc.messages.create(conv, a, encrypted()).await.unwrap();

        let found = svc.messages.search(b, "hello", Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message.body.content(), "Hello World");

        let in_conv = svc
            .messages
            .search_conversation(conv, b, "WORLD", Page::default())
            .await
            .unwrap();
        assert_eq!(in_conv.len(), 1);

        // Ciphertext is never matched, even by its own bytes.
        let none = svc.messages.search(b, "c2VjcmV0", Page::default()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn search_is_scoped_to_the_viewers_conversations() {
        let (svc, _) = services();
        let (conv, a, _) = pair(&svc).await;
        svc.messages.create(conv, a, text("private matter")).await.unwrap();
        let found = svc
            .messages
            .search(UserId::new(), "private", Page::default())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn empty_search_query_is_rejected() {
        let (svc, _) = services();
        let err = svc
            .messages
            .search(UserId::new(), "  ", Page::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
    }

    #[tokio::test]
    async fn encrypted_message_summary_has_empty_content() {
        let (svc, _) = services();
        let (conv, a, b) = pair(&svc).await;
        svc.messages.create(conv, a, encrypted()).await.unwrap();
        let stored = svc.conversations.get_for_participant(conv, b).await.unwrap();
        let summary = stored.last_message.unwrap().to_summary();
        assert_eq!(summary.content, "");
        assert_eq!(summary.encrypted_content.as_deref(), Some("c2VjcmV0"));
        assert_eq!(summary.iv.as_deref(), Some("aXYxMjM="));
    }
}
