use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A donation record was persisted for a freshly created payment intent.
    DonationRecorded {
        donation_id: Uuid,
        payment_intent_id: String,
        amount_minor: i64,
        currency: String,
        status: String,
    },
    /// A retry of an already-recorded intent was suppressed as a benign
    /// duplicate.
    DonationDuplicateSuppressed { payment_intent_id: String },
}

/// Consumes events from the channel and logs them. Downstream integrations
/// (receipt emails, reconciliation feeds) hang off this task.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::DonationRecorded {
                donation_id,
                payment_intent_id,
                amount_minor,
                currency,
                status,
            } => {
                info!(
                    %donation_id,
                    %payment_intent_id,
                    amount_minor,
                    %currency,
                    %status,
                    "donation recorded"
                );
            }
            Event::DonationDuplicateSuppressed { payment_intent_id } => {
                info!(%payment_intent_id, "duplicate donation suppressed");
            }
        }
    }
    info!("Event channel closed; event processor exiting");
}
