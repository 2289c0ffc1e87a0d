use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use courier_shared::api::engagement::{ReactionResponse, ReactionSummary};
use courier_shared::ids::{MessageId, ReactionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReaction {
    pub id: ReactionId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl From<MessageReaction> for ReactionResponse {
    fn from(r: MessageReaction) -> Self {
        ReactionResponse {
            id: r.id,
            message_id: r.message_id,
            user_id: r.user_id,
            emoji: r.emoji,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarredMessage {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an add-or-remove toggle, carrying the affected row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle<T> {
    Added(T),
    Removed(T),
}

impl<T> Toggle<T> {
    pub fn is_added(&self) -> bool {
        matches!(self, Toggle::Added(_))
    }
}

/// Per-emoji counts, most used first, ties broken by emoji.
pub fn summarize_reactions(reactions: &[MessageReaction], viewer: UserId) -> Vec<ReactionSummary> {
    let mut by_emoji: BTreeMap<&str, (i64, bool)> = BTreeMap::new();
    for r in reactions {
        let entry = by_emoji.entry(r.emoji.as_str()).or_default();
        entry.0 += 1;
        entry.1 |= r.user_id == viewer;
    }
    let mut summary: Vec<ReactionSummary> = by_emoji
        .into_iter()
        .map(|(emoji, (count, user_reacted))| ReactionSummary {
            emoji: emoji.to_string(),
            count,
            user_reacted,
        })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.emoji.cmp(&b.emoji)));
    summary
}
