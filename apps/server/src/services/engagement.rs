use courier_shared::error::CourierError;
use courier_shared::ids::{MessageId, ReactionId, UserId};

use super::{MessageService, ServiceContext};
use crate::models::{MessageReaction, MessageView, StarredMessage, Toggle};
use crate::pagination::Page;
use crate::validation::validate_emoji;

/// Reactions and stars. Both are add-or-remove toggles keyed by
/// `(message, user)`; the store makes each decision atomically.
#[derive(Clone)]
pub struct EngagementService {
    ctx: ServiceContext,
    messages: MessageService,
}

impl EngagementService {
    pub fn new(ctx: ServiceContext, messages: MessageService) -> Self {
        Self { ctx, messages }
    }

    /// Add a reaction, or remove the user's existing one (whatever its emoji).
    pub async fn add_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
        emoji: &str,
    ) -> Result<Toggle<MessageReaction>, CourierError> {
        let emoji = validate_emoji(emoji)?;
        self.messages.require_visible(message_id, user_id).await?;
        let candidate = MessageReaction {
            id: ReactionId::new(),
            message_id,
            user_id,
            emoji,
            created_at: self.ctx.now(),
        };
        let outcome = self
            .ctx
            .call(
                "toggle_reaction",
                self.ctx.store.toggle_reaction(&candidate),
            )
            .await?;
        tracing::debug!(%message_id, %user_id, added = outcome.is_added(), "reaction toggled");
        Ok(outcome)
    }

    /// Delete a reaction by id. Only the reactor's own reaction is touched;
    /// a missing one is not an error.
    pub async fn remove_reaction(
        &self,
        reaction_id: ReactionId,
        user_id: UserId,
    ) -> Result<bool, CourierError> {
        self.ctx
            .call(
                "delete_reaction",
                self.ctx.store.delete_reaction(reaction_id, user_id),
            )
            .await
    }

    pub async fn remove_user_reaction(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<bool, CourierError> {
        self.ctx
            .call(
                "delete_user_reaction",
                self.ctx.store.delete_user_reaction(message_id, user_id),
            )
            .await
    }

    pub async fn reactions(
        &self,
        message_id: MessageId,
        viewer: UserId,
    ) -> Result<Vec<MessageReaction>, CourierError> {
        self.messages.require_visible(message_id, viewer).await?;
        self.ctx
            .call(
                "reactions_for_messages",
                self.ctx.store.reactions_for_messages(&[message_id]),
            )
            .await
    }

    /// Returns `true` when the star is new.
    pub async fn star(&self, message_id: MessageId, user_id: UserId) -> Result<bool, CourierError> {
        self.messages.require_visible(message_id, user_id).await?;
        let star = StarredMessage {
            message_id,
            user_id,
            created_at: self.ctx.now(),
        };
        self.ctx
            .call("insert_star", self.ctx.store.insert_star(&star))
            .await
    }

    pub async fn unstar(&self, message_id: MessageId, user_id: UserId) -> Result<bool, CourierError> {
        self.ctx
            .call("delete_star", self.ctx.store.delete_star(message_id, user_id))
            .await
    }

    pub async fn toggle_star(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<Toggle<StarredMessage>, CourierError> {
        self.messages.require_visible(message_id, user_id).await?;
        let star = StarredMessage {
            message_id,
            user_id,
            created_at: self.ctx.now(),
        };
        self.ctx
            .call("toggle_star", self.ctx.store.toggle_star(&star))
            .await
    }

    pub async fn is_starred(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<bool, CourierError> {
        let starred = self
            .ctx
            .call(
                "starred_among",
                self.ctx.store.starred_among(user_id, &[message_id]),
            )
            .await?;
        Ok(!starred.is_empty())
    }

    /// The user's starred messages that they can still see, most recently
    /// starred first. Stars can only be placed by participants, so the
    /// store's deletion filter is the whole visibility check.
    pub async fn starred_messages(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<MessageView>, CourierError> {
        let stars = self
            .ctx
            .call(
                "list_stars",
                self.ctx.store.list_stars(user_id, page.limit, page.offset),
            )
            .await?;
        let ids: Vec<MessageId> = stars.iter().map(|s| s.message_id).collect();
        let mut messages = self
            .ctx
            .call("get_messages", self.ctx.store.get_messages(&ids))
            .await?;
        // Keep star order rather than store order.
        messages.sort_by_key(|m| ids.iter().position(|id| *id == m.id));
        self.messages.enrich(user_id, messages).await
    }
}
