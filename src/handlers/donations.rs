use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::donations::{DonationIntentResponse, NewDonation};

/// Donation request from clients. All fields are optional at the wire level
/// so absence is reported as a validation error rather than a parse error;
/// unknown fields (some clients also send `currency`) are ignored.
#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "amount": 25,
    "name": "Ada Lovelace",
    "email": "ada@example.com",
    "message": "Keep up the good work"
}))]
pub struct CreateDonationRequest {
    /// Donation amount; dollars or cents, normalized server-side
    #[schema(example = 25.0, value_type = Option<f64>)]
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount: Option<f64>,
    /// Donor name
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    /// Donor email
    #[schema(example = "ada@example.com")]
    pub email: Option<String>,
    /// Optional message from the donor
    #[schema(example = "Keep up the good work")]
    pub message: Option<String>,
}

/// Browser clients have sent the amount both as a JSON number and as a
/// numeric string. Coerce both; anything unparseable becomes NaN so the
/// normalizer rejects it with the usual message instead of a parse error.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => number.as_f64().or(Some(f64::NAN)),
        Some(Value::String(raw)) => Some(raw.trim().parse::<f64>().unwrap_or(f64::NAN)),
        Some(_) => Some(f64::NAN),
    })
}

/// Create a payment intent for a donation
#[utoipa::path(
    post,
    path = "/donations",
    request_body = CreateDonationRequest,
    params(
        ("Idempotency-Key" = Option<String>, Header, description = "Client-chosen key identifying one logical attempt")
    ),
    responses(
        (status = 200, description = "Payment intent created", body = DonationIntentResponse),
        (status = 400, description = "Missing fields or invalid amount", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment processor unreachable or rejected the intent", body = crate::errors::ErrorResponse),
        (status = 500, description = "Donation record could not be written", body = crate::errors::ErrorResponse)
    ),
    tag = "Donations"
)]
pub async fn create_donation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateDonationRequest>,
) -> Result<(StatusCode, Json<DonationIntentResponse>), ServiceError> {
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let response = state
        .services
        .donations
        .create_donation(NewDonation {
            amount: request.amount,
            name: request.name,
            email: request.email,
            message: request.message,
            idempotency_key,
        })
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

/// Donation routes
pub fn donation_routes() -> Router<AppState> {
    Router::new().route("/", post(create_donation))
}
