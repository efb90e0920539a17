use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Donations API",
        version = "0.1.0",
        description = "Backend for the donation flow: accepts a donation request, creates a \
payment intent with the processor, records the donation, and returns the client secret the \
browser needs to complete the charge."
    ),
    paths(crate::handlers::donations::create_donation),
    components(schemas(
        crate::handlers::donations::CreateDonationRequest,
        crate::services::donations::DonationIntentResponse,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Donations", description = "Donation payment intent endpoints")
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document as JSON
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
