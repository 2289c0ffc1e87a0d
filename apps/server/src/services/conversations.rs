use courier_shared::api::conversation::ConversationResponse;
use courier_shared::error::CourierError;
use courier_shared::ids::{ConversationId, UserId};

use super::ServiceContext;
use crate::models::Conversation;
use crate::pagination::Page;

/// Two-party conversations: creation, listing, unread counters, typing.
#[derive(Clone)]
pub struct ConversationService {
    ctx: ServiceContext,
}

impl ConversationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Return the conversation between the two users, creating it if needed.
    /// The flag is `true` when this call created it.
    pub async fn get_or_create(
        &self,
        caller: UserId,
        other: UserId,
    ) -> Result<(Conversation, bool), CourierError> {
        if caller == other {
            return Err(CourierError::Validation(
                "cannot start a conversation with yourself".into(),
            ));
        }
        let store = &self.ctx.store;
        if let Some(existing) = self
            .ctx
            .call("find_conversation_by_pair", store.find_conversation_by_pair(caller, other))
            .await?
        {
            return Ok((existing, false));
        }

        let candidate = Conversation::new(ConversationId::new(), caller, other, self.ctx.now());
        let inserted = self
            .ctx
            .call(
                "insert_conversation",
                store.insert_conversation_if_absent(&candidate),
            )
            .await?;
        if let Some(created) = inserted {
            tracing::info!(conversation_id = %created.id, "conversation created");
            return Ok((created, true));
        }

        // Lost a creation race; the winner's row is the conversation.
        tracing::debug!(%caller, %other, "conversation created concurrently");
        self.ctx
            .call("find_conversation_by_pair", store.find_conversation_by_pair(caller, other))
            .await?
            .map(|c| (c, false))
            .ok_or_else(|| CourierError::Internal("conversation missing after conflict".into()))
    }

    /// Load a conversation the caller takes part in.
    pub async fn get_for_participant(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Conversation, CourierError> {
        let conversation = self
            .ctx
            .call("get_conversation", self.ctx.store.get_conversation(id))
            .await?
            .ok_or(CourierError::NotFound)?;
        if !conversation.includes(user_id) {
            return Err(CourierError::Forbidden);
        }
        Ok(conversation)
    }

    /// Render a conversation for `viewer` as of now.
    pub fn view(
        &self,
        conversation: &Conversation,
        viewer: UserId,
    ) -> Result<ConversationResponse, CourierError> {
        conversation
            .view_for(viewer, self.ctx.now())
            .ok_or(CourierError::Forbidden)
    }

    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<ConversationResponse>, CourierError> {
        let conversations = self
            .ctx
            .call(
                "list_conversations",
                self.ctx
                    .store
                    .list_conversations(user_id, page.limit, page.offset),
            )
            .await?;
        let now = self.ctx.now();
        Ok(conversations
            .iter()
            .filter_map(|c| c.view_for(user_id, now))
            .collect())
    }

    pub async fn update_typing(
        &self,
        id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    ) -> Result<(), CourierError> {
        self.get_for_participant(id, user_id).await?;
        let updated = self
            .ctx
            .call(
                "signal_typing",
                self.ctx
                    .store
                    .signal_typing(id, user_id, is_typing, self.ctx.now()),
            )
            .await?;
        if !updated {
            return Err(CourierError::NotFound);
        }
        Ok(())
    }

    /// Clear the caller's unread counter.
    pub async fn mark_as_read(&self, id: ConversationId, user_id: UserId) -> Result<(), CourierError> {
        self.get_for_participant(id, user_id).await?;
        self.ctx
            .call("reset_unread", self.ctx.store.reset_unread(id, user_id))
            .await?;
        Ok(())
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, CourierError> {
        self.ctx
            .call("total_unread", self.ctx.store.total_unread(user_id))
            .await
    }

    /// Hide the conversation for the caller until a newer message arrives.
    pub async fn delete_for_user(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<(), CourierError> {
        self.get_for_participant(id, user_id).await?;
        self.ctx
            .call(
                "hide_conversation",
                self.ctx.store.hide_conversation(id, user_id, self.ctx.now()),
            )
            .await?;
        tracing::info!(conversation_id = %id, %user_id, "conversation hidden");
        Ok(())
    }
}
