use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Courier API",
        version = "0.1.0",
        description = "Two-party messaging with end-to-end encryption key management"
    ),
    paths(
        // Health
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
        // Conversations
        crate::handlers::conversations::create,
        crate::handlers::conversations::list,
        crate::handlers::conversations::unread_count,
        crate::handlers::conversations::get_one,
        crate::handlers::conversations::delete,
        crate::handlers::conversations::typing,
        crate::handlers::conversations::mark_read,
        // Messages
        crate::handlers::messages::send,
        crate::handlers::messages::history,
        crate::handlers::messages::mark_all_read,
        crate::handlers::messages::pinned,
        crate::handlers::messages::search_in_conversation,
        crate::handlers::messages::search,
        crate::handlers::messages::get_one,
        crate::handlers::messages::edit,
        crate::handlers::messages::delete,
        crate::handlers::messages::update_status,
        crate::handlers::messages::edit_history,
        crate::handlers::messages::pin,
        crate::handlers::messages::unpin,
        crate::handlers::messages::forward,
        // Engagement
        crate::handlers::engagement::react,
        crate::handlers::engagement::list_reactions,
        crate::handlers::engagement::unreact,
        crate::handlers::engagement::delete_reaction,
        crate::handlers::engagement::star_status,
        crate::handlers::engagement::star,
        crate::handlers::engagement::unstar,
        crate::handlers::engagement::toggle_star,
        crate::handlers::engagement::starred,
        // Keys
        crate::handlers::keys::register_identity,
        crate::handlers::keys::get_identity,
        crate::handlers::keys::fingerprint,
        crate::handlers::keys::upload_pre_keys,
        crate::handlers::keys::pre_key_count,
        crate::handlers::keys::upload_signed_pre_key,
        crate::handlers::keys::get_signed_pre_key,
        crate::handlers::keys::get_signed_pre_key_by_id,
        crate::handlers::keys::bundle,
        crate::handlers::keys::store_conversation_key,
        crate::handlers::keys::get_conversation_key,
        crate::handlers::keys::revoke_conversation_key,
        // Sessions
        crate::handlers::sessions::create,
        crate::handlers::sessions::get,
        crate::handlers::sessions::update_state,
    ),
    components(schemas(
        // Error
        crate::error::ErrorResponse,
        // IDs
        courier_shared::ids::UserId,
        courier_shared::ids::ConversationId,
        courier_shared::ids::MessageId,
        courier_shared::ids::ReactionId,
        courier_shared::ids::SessionId,
        // Conversation
        courier_shared::api::conversation::CreateConversationRequest,
        courier_shared::api::conversation::ConversationResponse,
        courier_shared::api::conversation::ConversationListResponse,
        courier_shared::api::conversation::LastMessageSummary,
        courier_shared::api::conversation::TypingRequest,
        courier_shared::api::conversation::UnreadCountResponse,
        // Message
        courier_shared::api::message::MessageStatus,
        courier_shared::api::message::MessageType,
        courier_shared::api::message::Attachment,
        courier_shared::api::message::SendMessageRequest,
        courier_shared::api::message::EditMessageRequest,
        courier_shared::api::message::UpdateStatusRequest,
        courier_shared::api::message::ForwardMessageRequest,
        courier_shared::api::message::ReplyPreview,
        courier_shared::api::message::MessageResponse,
        courier_shared::api::message::MessageHistoryResponse,
        courier_shared::api::message::MessageListResponse,
        courier_shared::api::message::EditRecordResponse,
        courier_shared::api::message::EditHistoryResponse,
        courier_shared::api::message::MarkReadResponse,
        // Engagement
        courier_shared::api::engagement::AddReactionRequest,
        courier_shared::api::engagement::ToggleAction,
        courier_shared::api::engagement::ReactionResponse,
        courier_shared::api::engagement::ReactionToggleResponse,
        courier_shared::api::engagement::ReactionSummary,
        courier_shared::api::engagement::MessageReactionsResponse,
        courier_shared::api::engagement::StarStatusResponse,
        // Keys
        courier_shared::api::keys::RegisterIdentityKeyRequest,
        courier_shared::api::keys::IdentityKeyResponse,
        courier_shared::api::keys::PreKeyUpload,
        courier_shared::api::keys::UploadPreKeysRequest,
        courier_shared::api::keys::UploadPreKeysResponse,
        courier_shared::api::keys::PreKeyCountResponse,
        courier_shared::api::keys::UploadSignedPreKeyRequest,
        courier_shared::api::keys::SignedPreKeyResponse,
        courier_shared::api::keys::OneTimePreKeyResponse,
        courier_shared::api::keys::KeyBundleResponse,
        courier_shared::api::keys::FingerprintResponse,
        courier_shared::api::keys::StoreConversationKeyRequest,
        courier_shared::api::keys::ConversationKeyResponse,
        // Session
        courier_shared::api::session::SessionResponse,
        courier_shared::api::session::SessionLookupResponse,
        courier_shared::api::session::UpdateSessionStateRequest,
        // Server-local
        crate::handlers::PageQuery,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Conversations", description = "Two-party conversations, typing and unread counters"),
        (name = "Messages", description = "Sending, history, edits, pins, forwarding and search"),
        (name = "Engagement", description = "Reactions and stars"),
        (name = "Keys", description = "Identity, pre-key and conversation key directory"),
        (name = "Sessions", description = "Double-ratchet session state"),
    ),
    modifiers(&BearerAuth),
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route_group() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health/ready",
            "/api/conversations",
            "/api/conversations/{conversation_id}/messages",
            "/api/messages/{message_id}/reactions",
            "/api/keys/bundle/{user_id}",
            "/api/sessions/{session_id}/state",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
