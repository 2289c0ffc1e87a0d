use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use courier_shared::ids::UserId;

use crate::state::AppState;

/// Authenticated user extracted from a valid access JWT.
///
/// Use this as a handler parameter to require authentication:
/// ```ignore
/// async fn my_handler(auth: AuthUser) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
}

#[derive(Debug)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<AuthUser>() {
            return Ok(*auth);
        }

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("auth: missing or non-ASCII Authorization header");
                AuthRejection
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            tracing::debug!("auth: Authorization header missing Bearer prefix");
            AuthRejection
        })?;

        let claims = state.jwt.validate_access_token(token).map_err(|e| {
            tracing::debug!(error = %e, "auth: token validation failed");
            AuthRejection
        })?;

        let user_id: UserId = claims.sub.parse().map_err(|_| AuthRejection)?;
        let auth = AuthUser { user_id };
        parts.extensions.insert(auth);
        Ok(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::AccessClaims;
    use crate::state::testing::{app_state, mint, token_for};

    fn parts_with_auth(value: Option<String>) -> Parts {
        let mut builder = axum::http::Request::builder();
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_user_extractor_returns_user_id_from_valid_token() {
        let state = app_state();
        let uid = UserId::new();
        let token = token_for(uid);

        let mut parts = parts_with_auth(Some(format!("Bearer {token}")));
        let auth = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(auth.user_id, uid);
    }

    #[tokio::test]
    async fn auth_user_extractor_returns_401_when_header_missing() {
        let state = app_state();
        let mut parts = parts_with_auth(None);

        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_user_extractor_returns_401_without_bearer_prefix() {
        let state = app_state();
        let token = token_for(UserId::new());
        let mut parts = parts_with_auth(Some(token));

        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn auth_user_extractor_returns_401_when_token_expired() {
        let state = app_state();
        let claims = AccessClaims {
            sub: UserId::new().to_string(),
            purpose: "access".to_string(),
            exp: 1000,
            iat: 900,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = mint(&claims);

        let mut parts = parts_with_auth(Some(format!("Bearer {token}")));
        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_user_extractor_returns_401_when_token_is_malformed() {
        let state = app_state();
        let mut parts = parts_with_auth(Some("Bearer not-a-jwt".into()));

        let result = AuthUser::from_request_parts(&mut parts, &state).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn auth_user_extractor_returns_401_when_subject_is_not_a_uuid() {
        let state = app_state();
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = AccessClaims {
            sub: "alice".to_string(),
            purpose: "access".to_string(),
            exp: now + 300,
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = mint(&claims);

        let mut parts = parts_with_auth(Some(format!("Bearer {token}")));
        assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
    }
}
