use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use courier_shared::error::CourierError;

/// Newtype wrapper for `CourierError` that implements `IntoResponse`.
///
/// The orphan rule applies: neither the trait (`IntoResponse`)
/// nor the type (`CourierError`) is defined in this crate.
pub struct ServerError(pub CourierError);

/// JSON body of every error response.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CourierError::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            CourierError::Unauthorized => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            CourierError::Forbidden => (StatusCode::FORBIDDEN, self.0.to_string()),
            CourierError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            CourierError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            // Storage details were logged where they happened.
            CourierError::StorageUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "storage unavailable".to_string(),
            ),
            CourierError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<CourierError> for ServerError {
    fn from(e: CourierError) -> Self {
        ServerError(e)
    }
}
