use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

#[utoipa::path(get, path = "/health/live", tag = "Health", responses((status = 200, description = "Process is alive")))]
/// GET /health/live. Always 200.
/// Used by load balancers to check if the process is alive.
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[utoipa::path(get, path = "/health/ready", tag = "Health", responses((status = 200, description = "Store reachable"), (status = 503, description = "Store unreachable")))]
/// GET /health/ready. Pings the store within the configured deadline.
/// Returns 200 on success, 503 on failure.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let ping = tokio::time::timeout(state.config.store.timeout(), state.store.ping()).await;
    match ping {
        Ok(Ok(())) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness: store ping failed");
            unavailable()
        }
        Err(_) => {
            tracing::warn!("readiness: store ping timed out");
            unavailable()
        }
    }
}

fn unavailable() -> axum::response::Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "status": "unavailable" })),
    )
        .into_response()
}
