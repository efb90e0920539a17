use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, instrument};

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Donor details forwarded to the processor as intent metadata.
#[derive(Debug, Clone)]
pub struct IntentMetadata {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// A freshly created processor-side payment intent.
///
/// The client secret is handed to the browser to complete the charge and must
/// never be logged or persisted, hence the redacting `Debug`.
#[derive(Clone)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

impl fmt::Debug for CreatedIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedIntent")
            .field("id", &self.id)
            .field("client_secret", &"[redacted]")
            .field("status", &self.status)
            .finish()
    }
}

/// Call boundary to the external payment processor.
///
/// The same idempotency key passed twice returns the intent created on the
/// first call; that guarantee belongs to the processor, so implementations
/// only have to pass the key through faithfully.
#[async_trait]
pub trait PaymentIntentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        idempotency_key: &str,
        metadata: &IntentMetadata,
    ) -> Result<CreatedIntent, ServiceError>;
}

/// Wire shape of a Stripe payment intent (the fields this flow reads).
#[derive(Deserialize)]
struct PaymentIntentBody {
    id: String,
    client_secret: Option<String>,
    status: String,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// Stripe REST implementation of the gateway.
#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    /// Build a client with rustls and the configured call timeout. The
    /// timeout is the only bound on the flow's single suspend point; expiry
    /// surfaces as a gateway error.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(cfg.gateway_timeout())
            .build()
            .map_err(|e| ServiceError::GatewayError(format!("failed to build client: {}", e)))?;

        Ok(Self {
            http,
            api_base: cfg.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: cfg.stripe_secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentIntentGateway for StripeGateway {
    #[instrument(skip(self, metadata))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        idempotency_key: &str,
        metadata: &IntentMetadata,
    ) -> Result<CreatedIntent, ServiceError> {
        let params: Vec<(&str, String)> = vec![
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("payment_method_types[]", "card".to_string()),
            ("metadata[name]", metadata.name.clone()),
            ("metadata[email]", metadata.email.clone()),
            ("metadata[message]", metadata.message.clone()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "payment intent request failed");
                if err.is_timeout() {
                    ServiceError::GatewayError("payment intent request timed out".to_string())
                } else {
                    ServiceError::GatewayError(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let body: PaymentIntentBody = response.json().await.map_err(|err| {
                ServiceError::GatewayError(format!("invalid payment intent response: {}", err))
            })?;

            let client_secret = body.client_secret.ok_or_else(|| {
                ServiceError::GatewayError(
                    "payment intent response missing client secret".to_string(),
                )
            })?;

            Ok(CreatedIntent {
                id: body.id,
                client_secret,
                status: body.status,
            })
        } else {
            let message = response
                .json::<StripeErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| {
                    let err = envelope.error;
                    err.message.or(err.code).or(err.error_type)
                })
                .unwrap_or_else(|| format!("processor returned {}", status));

            error!(http_status = %status, %message, "payment intent creation rejected");
            Err(ServiceError::GatewayError(message))
        }
    }
}
