use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Error body returned to clients.
///
/// The `error` field carries the human-readable message; validation failures
/// echo the exact message (`"Invalid donation amount"`), internal failures a
/// generic one.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Invalid donation amount",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Human-readable error description
    #[schema(example = "Invalid donation amount")]
    pub error: String,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2024-12-09T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Persistence inconsistency: {0}")]
    PersistenceInconsistency(String),
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_) | Self::PersistenceInconsistency(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking processor or
    /// database detail to the caller.
    pub fn response_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::GatewayError(_) => "Payment processor request failed".to_string(),
            Self::PersistenceInconsistency(_) => "Failed to record donation".to_string(),
            Self::DatabaseError(_) => "Database error".to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            // The full error (processor message, database detail) stays in the
            // logs; the response body carries only the generic message.
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
