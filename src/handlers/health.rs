use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tracing::error;

use crate::handlers::AppState;

/// Simple reachability check
pub async fn ping() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Basic liveness probe - just checks if the service is running
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe - verifies the database is reachable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(err) => {
            error!(error = %err, "database ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// Health routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
}
