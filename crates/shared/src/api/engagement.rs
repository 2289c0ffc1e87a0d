use crate::ids::{MessageId, ReactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct AddReactionRequest {
    pub emoji: String,
}

/// Result of an add-or-remove toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ToggleAction {
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ReactionResponse {
    pub id: ReactionId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ReactionToggleResponse {
    pub action: ToggleAction,
    pub reaction: Option<ReactionResponse>,
}

/// Per-emoji aggregate for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: i64,
    pub user_reacted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct MessageReactionsResponse {
    pub message_id: MessageId,
    pub summary: Vec<ReactionSummary>,
    pub reactions: Vec<ReactionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct StarStatusResponse {
    pub message_id: MessageId,
    pub starred: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_action_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ToggleAction::Removed).unwrap(),
            "\"removed\""
        );
    }

    #[test]
    fn removed_toggle_has_no_reaction() {
        let resp = ReactionToggleResponse {
            action: ToggleAction::Removed,
            reaction: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["action"], "removed");
        assert!(json["reaction"].is_null());
    }
}
