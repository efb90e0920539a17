use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, SqlErr};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::donation::{self, DonationStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::stripe::{IntentMetadata, PaymentIntentGateway};

/// One donation attempt as received from the HTTP layer, still untrusted:
/// fields may be missing and the amount's unit is ambiguous.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub amount: Option<f64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Success payload: only the client secret leaves this flow. No Debug derive
/// so the secret cannot leak through format strings.
#[derive(Serialize, ToSchema)]
pub struct DonationIntentResponse {
    /// Secret the browser uses to confirm the charge with the processor
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

/// Orchestrates one donation attempt: normalize the amount, resolve the
/// idempotency key, create the processor-side intent, persist the local
/// record, and hand the client secret back.
pub struct DonationService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentIntentGateway>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl DonationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentIntentGateway>,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            currency,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_donation(
        &self,
        input: NewDonation,
    ) -> Result<DonationIntentResponse, ServiceError> {
        let (name, email) = match (input.name, input.email) {
            (Some(name), Some(email)) => (name, email),
            _ => {
                return Err(ServiceError::InvalidInput(
                    "Missing required fields".to_string(),
                ))
            }
        };
        let raw_amount = input.amount.ok_or_else(|| {
            ServiceError::InvalidInput("Missing required fields".to_string())
        })?;

        // Everything past this point has validated input; the rejection paths
        // above run before any external call is made.
        let amount_minor = normalize_amount(raw_amount)?;
        let idempotency_key =
            resolve_idempotency_key(input.idempotency_key.as_deref(), &email, amount_minor);
        let message = input.message.unwrap_or_default();

        info!(%email, amount_minor, "creating donation intent");

        let metadata = IntentMetadata {
            name: name.clone(),
            email: email.clone(),
            message: message.clone(),
        };

        // Processor first, record second: the processor is the source of
        // truth, and reversing the order would mint local records with no
        // corresponding charge. This ordering must be preserved.
        let intent = match self
            .gateway
            .create_intent(amount_minor, &self.currency, &idempotency_key, &metadata)
            .await
        {
            Ok(intent) => intent,
            Err(err) => {
                counter!("donations.gateway_failures", 1);
                return Err(err);
            }
        };

        let status = map_intent_status(&intent.status);
        let now = Utc::now();

        let record = donation::ActiveModel {
            id: Set(Uuid::new_v4()),
            amount: Set(amount_minor),
            name: Set(name),
            email: Set(email),
            message: Set(message),
            currency: Set(self.currency.clone()),
            payment_intent_id: Set(intent.id.clone()),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match record.insert(&*self.db).await {
            Ok(saved) => {
                counter!("donations.recorded", 1);
                let event = Event::DonationRecorded {
                    donation_id: saved.id,
                    payment_intent_id: saved.payment_intent_id,
                    amount_minor: saved.amount,
                    currency: saved.currency,
                    status: intent.status.clone(),
                };
                if let Err(e) = self.event_sender.send(event).await {
                    warn!(error = %e, "failed to publish donation event");
                }
            }
            Err(err) => match err.sql_err() {
                // A retry of the same logical attempt reuses the processor's
                // intent, so the record already exists: not an error.
                Some(SqlErr::UniqueConstraintViolation(detail))
                    if detail.contains("payment_intent_id") =>
                {
                    counter!("donations.duplicates_suppressed", 1);
                    warn!(
                        payment_intent_id = %intent.id,
                        "duplicate donation record for payment intent, continuing"
                    );
                    let event = Event::DonationDuplicateSuppressed {
                        payment_intent_id: intent.id.clone(),
                    };
                    if let Err(e) = self.event_sender.send(event).await {
                        warn!(error = %e, "failed to publish donation event");
                    }
                }
                _ => {
                    // The charge intent exists at the processor but we have no
                    // local trace of it. Surface loudly.
                    counter!("donations.persistence_failures", 1);
                    error!(
                        payment_intent_id = %intent.id,
                        error = %err,
                        "payment intent created but donation record write failed"
                    );
                    return Err(ServiceError::PersistenceInconsistency(err.to_string()));
                }
            },
        }

        Ok(DonationIntentResponse {
            client_secret: intent.client_secret,
        })
    }
}

/// Convert the client-supplied amount into minor currency units.
///
/// An integral value of at least 100 is taken as already being cents;
/// anything else is treated as a major-unit value and scaled by 100. The
/// boundary cannot distinguish $100 sent as `100` from 100 cents; callers
/// wanting exact control pass cents.
pub fn normalize_amount(raw: f64) -> Result<i64, ServiceError> {
    if !raw.is_finite() {
        return Err(ServiceError::InvalidInput(
            "Invalid donation amount".to_string(),
        ));
    }

    let amount_minor = if raw.fract() == 0.0 && raw >= 100.0 {
        raw as i64
    } else {
        (raw * 100.0).round() as i64
    };

    if amount_minor <= 0 {
        return Err(ServiceError::InvalidInput(
            "Invalid donation amount".to_string(),
        ));
    }

    Ok(amount_minor)
}

/// Resolve the idempotency key for one logical attempt: a caller-supplied key
/// verbatim, otherwise a composite of donor email, normalized amount, and a
/// millisecond timestamp. The fallback is best-effort de-duplication; a
/// collision is resolved in favor of not charging twice.
pub fn resolve_idempotency_key(supplied: Option<&str>, email: &str, amount_minor: i64) -> String {
    match supplied {
        Some(key) if !key.trim().is_empty() => key.to_string(),
        _ => format!(
            "{}-{}-{}",
            email,
            amount_minor,
            Utc::now().timestamp_millis()
        ),
    }
}

/// Map a processor payment intent status onto the local vocabulary.
///
/// Total: every known status maps explicitly and anything unrecognized lands
/// on `Pending`, so a new processor status never blocks record creation; the
/// record gets reconciled out-of-band.
pub fn map_intent_status(status: &str) -> DonationStatus {
    match status {
        "succeeded" => DonationStatus::Succeeded,
        "canceled" => DonationStatus::Canceled,
        "processing"
        | "requires_payment_method"
        | "requires_action"
        | "requires_confirmation"
        | "requires_capture" => DonationStatus::Pending,
        _ => DonationStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_amounts_of_at_least_100_pass_through_as_cents() {
        assert_eq!(normalize_amount(100.0).unwrap(), 100);
        assert_eq!(normalize_amount(2500.0).unwrap(), 2500);
        assert_eq!(normalize_amount(150_000.0).unwrap(), 150_000);
    }

    #[test]
    fn small_or_fractional_amounts_are_treated_as_dollars() {
        assert_eq!(normalize_amount(25.0).unwrap(), 2500);
        assert_eq!(normalize_amount(99.0).unwrap(), 9900);
        assert_eq!(normalize_amount(25.5).unwrap(), 2550);
        assert_eq!(normalize_amount(100.5).unwrap(), 10050);
        assert_eq!(normalize_amount(0.99).unwrap(), 99);
    }

    #[test]
    fn fractional_cents_round_to_the_nearest_cent() {
        assert_eq!(normalize_amount(10.005).unwrap(), 1001);
        assert_eq!(normalize_amount(10.004).unwrap(), 1000);
    }

    #[test]
    fn non_positive_and_non_finite_amounts_are_rejected() {
        assert!(normalize_amount(0.0).is_err());
        assert!(normalize_amount(-5.0).is_err());
        assert!(normalize_amount(-500.0).is_err());
        assert!(normalize_amount(f64::NAN).is_err());
        assert!(normalize_amount(f64::INFINITY).is_err());
        assert!(normalize_amount(f64::NEG_INFINITY).is_err());
        // Rounds to zero cents.
        assert!(normalize_amount(0.001).is_err());
    }

    #[test]
    fn rejection_carries_the_exact_client_message() {
        match normalize_amount(0.0) {
            Err(ServiceError::InvalidInput(msg)) => assert_eq!(msg, "Invalid donation amount"),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn supplied_idempotency_key_is_used_verbatim() {
        let key = resolve_idempotency_key(Some("attempt-42"), "donor@example.com", 2500);
        assert_eq!(key, "attempt-42");
    }

    #[test]
    fn missing_or_blank_key_falls_back_to_the_composite() {
        for supplied in [None, Some(""), Some("   ")] {
            let key = resolve_idempotency_key(supplied, "donor@example.com", 2500);
            assert!(key.starts_with("donor@example.com-2500-"));
        }
    }

    #[test]
    fn known_intent_statuses_map_per_the_table() {
        assert_eq!(map_intent_status("succeeded"), DonationStatus::Succeeded);
        assert_eq!(map_intent_status("canceled"), DonationStatus::Canceled);
        for pending in [
            "processing",
            "requires_payment_method",
            "requires_action",
            "requires_confirmation",
            "requires_capture",
        ] {
            assert_eq!(map_intent_status(pending), DonationStatus::Pending);
        }
    }

    #[test]
    fn unknown_intent_statuses_default_to_pending() {
        assert_eq!(map_intent_status("requires_telepathy"), DonationStatus::Pending);
        assert_eq!(map_intent_status(""), DonationStatus::Pending);
    }
}
