use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::handlers;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Builds the application router with all middleware and routes.
pub fn build_router(state: AppState) -> axum::Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ]);

    let conversation_routes = axum::Router::new()
        .route(
            "/",
            post(handlers::conversations::create).get(handlers::conversations::list),
        )
        .route("/unread", get(handlers::conversations::unread_count))
        .route(
            "/{conversation_id}",
            get(handlers::conversations::get_one).delete(handlers::conversations::delete),
        )
        .route(
            "/{conversation_id}/typing",
            post(handlers::conversations::typing),
        )
        .route(
            "/{conversation_id}/read",
            post(handlers::conversations::mark_read),
        )
        .route(
            "/{conversation_id}/messages",
            get(handlers::messages::history).post(handlers::messages::send),
        )
        .route(
            "/{conversation_id}/messages/read",
            post(handlers::messages::mark_all_read),
        )
        .route(
            "/{conversation_id}/messages/pinned",
            get(handlers::messages::pinned),
        )
        .route(
            "/{conversation_id}/messages/search",
            get(handlers::messages::search_in_conversation),
        )
        .route(
            "/{conversation_id}/session",
            get(handlers::sessions::get).post(handlers::sessions::create),
        )
        .route(
            "/{conversation_id}/keys",
            put(handlers::keys::store_conversation_key)
                .delete(handlers::keys::revoke_conversation_key),
        )
        .route(
            "/{conversation_id}/keys/{user_id}",
            get(handlers::keys::get_conversation_key),
        );

    let message_routes = axum::Router::new()
        .route("/search", get(handlers::messages::search))
        .route("/starred", get(handlers::engagement::starred))
        .route(
            "/{message_id}",
            get(handlers::messages::get_one)
                .patch(handlers::messages::edit)
                .delete(handlers::messages::delete),
        )
        .route("/{message_id}/status", put(handlers::messages::update_status))
        .route("/{message_id}/edits", get(handlers::messages::edit_history))
        .route(
            "/{message_id}/pin",
            put(handlers::messages::pin).delete(handlers::messages::unpin),
        )
        .route("/{message_id}/forward", post(handlers::messages::forward))
        .route(
            "/{message_id}/reactions",
            get(handlers::engagement::list_reactions)
                .post(handlers::engagement::react)
                .delete(handlers::engagement::unreact),
        )
        .route(
            "/{message_id}/star",
            get(handlers::engagement::star_status)
                .put(handlers::engagement::star)
                .delete(handlers::engagement::unstar),
        )
        .route(
            "/{message_id}/star/toggle",
            post(handlers::engagement::toggle_star),
        );

    let key_routes = axum::Router::new()
        .route("/identity", put(handlers::keys::register_identity))
        .route("/identity/{user_id}", get(handlers::keys::get_identity))
        .route("/fingerprint/{user_id}", get(handlers::keys::fingerprint))
        .route("/prekeys", post(handlers::keys::upload_pre_keys))
        .route("/prekeys/count", get(handlers::keys::pre_key_count))
        .route("/signed-prekey", put(handlers::keys::upload_signed_pre_key))
        .route(
            "/signed-prekey/{user_id}",
            get(handlers::keys::get_signed_pre_key),
        )
        .route(
            "/signed-prekey/{user_id}/{key_id}",
            get(handlers::keys::get_signed_pre_key_by_id),
        )
        .route("/bundle/{user_id}", get(handlers::keys::bundle));

    axum::Router::new()
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .nest("/api/conversations", conversation_routes)
        .nest("/api/messages", message_routes)
        .route(
            "/api/reactions/{reaction_id}",
            delete(handlers::engagement::delete_reaction),
        )
        .nest("/api/keys", key_routes)
        .route(
            "/api/sessions/{session_id}/state",
            put(handlers::sessions::update_state),
        )
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn request_id_middleware(
    request: axum::extract::Request,
    next: middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::Span::current().record("request_id", request_id.as_str());
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
