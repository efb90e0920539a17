pub mod donations;
pub mod health;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::donations::DonationService;
use crate::services::stripe::PaymentIntentGateway;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub donations: Arc<DonationService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentIntentGateway>,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        let donations = Arc::new(DonationService::new(
            db_pool,
            gateway,
            event_sender,
            currency,
        ));

        Self { donations }
    }
}
