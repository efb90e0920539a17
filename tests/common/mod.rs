use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use sea_orm::{EntityTrait, PaginatorTrait};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use donations_api::{
    api_routes,
    config::AppConfig,
    db::{self, DbConfig},
    entities::donation,
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    migrator::Migrator,
    services::stripe::{CreatedIntent, IntentMetadata, PaymentIntentGateway},
    AppState,
};

/// Scripted stand-in for the payment processor.
///
/// Mirrors the processor's idempotency guarantee: the intent id is derived
/// deterministically from the idempotency key, so replaying a key replays the
/// same intent and trips the record store's unique index.
pub struct MockGateway {
    status: Mutex<String>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
    last_key: Mutex<Option<String>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new("processing".to_string()),
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            last_key: Mutex::new(None),
        })
    }

    /// Intent status returned on the next calls.
    pub fn set_status(&self, status: &str) {
        *self.status.lock().unwrap() = status.to_string();
    }

    /// Make the next calls fail as a gateway error.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_idempotency_key(&self) -> Option<String> {
        self.last_key.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentIntentGateway for MockGateway {
    async fn create_intent(
        &self,
        _amount_minor: i64,
        _currency: &str,
        idempotency_key: &str,
        _metadata: &IntentMetadata,
    ) -> Result<CreatedIntent, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock().unwrap() = Some(idempotency_key.to_string());

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(ServiceError::GatewayError(message));
        }

        let mut hasher = DefaultHasher::new();
        idempotency_key.hash(&mut hasher);
        let digest = hasher.finish();

        Ok(CreatedIntent {
            id: format!("pi_{:016x}", digest),
            client_secret: format!("pi_{:016x}_secret_test", digest),
            status: self.status.lock().unwrap().clone(),
        })
    }
}

/// Helper harness for spinning up an application state backed by an in-memory
/// SQLite database and the mock gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // A single pooled connection keeps the in-memory database alive and
        // shared for the lifetime of the test.
        let conn = db::establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("in-memory SQLite connection");
        Migrator::up(&conn, None).await.expect("migrations");
        let db_arc = Arc::new(conn);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = MockGateway::new();
        let services = AppServices::new(
            db_arc.clone(),
            gateway.clone(),
            Arc::new(event_sender.clone()),
            "usd".to_string(),
        );

        let cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "sk_test_mock_key".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = api_routes().with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.post_json_inner(uri, body, None).await
    }

    pub async fn post_json_with_key(&self, uri: &str, body: Value, key: &str) -> Response<Body> {
        self.post_json_inner(uri, body, Some(key)).await
    }

    async fn post_json_inner(
        &self,
        uri: &str,
        body: Value,
        idempotency_key: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }
        let request = builder.body(Body::from(body.to_string())).expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn donation_count(&self) -> u64 {
        donation::Entity::find()
            .count(&*self.state.db)
            .await
            .expect("count donations")
    }

    pub async fn first_donation(&self) -> Option<donation::Model> {
        donation::Entity::find()
            .one(&*self.state.db)
            .await
            .expect("load donation")
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
