use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use atelier_api::{
    app_router,
    config::AppConfig,
    db,
    entities::artwork,
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    payments::{signature, CreateIntentRequest, PaymentIntent, PaymentProcessor},
    AppState,
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret_for_integration_tests";

/// Scripted payment processor. Responses are consumed in order; every
/// received request is captured for assertion.
pub struct StubProcessor {
    responses: Mutex<VecDeque<Result<PaymentIntent, String>>>,
    requests: Mutex<Vec<CreateIntentRequest>>,
}

impl StubProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push_intent(&self, intent: PaymentIntent) {
        self.responses.lock().unwrap().push_back(Ok(intent));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<CreateIntentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProcessor for StubProcessor {
    async fn create_payment_intent(
        &self,
        request: CreateIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        self.requests.lock().unwrap().push(request);
        let scripted = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted processor response left");
        scripted.map_err(ServiceError::ExternalServiceError)
    }
}

/// Test application backed by in-memory SQLite and a stubbed payment
/// processor.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub processor: Arc<StubProcessor>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application, letting the caller adjust configuration
    /// before services are wired.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory
        // database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.payment.webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let config = Arc::new(cfg);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let processor = StubProcessor::new();
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            config.clone(),
            processor.clone(),
        );

        let state = AppState {
            db: db_arc,
            config,
            event_sender,
            services,
        };

        let router = app_router(state.clone());

        Self {
            router,
            state,
            processor,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// A clone of the application router, for serving over a real socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Send a raw, pre-built request against the router.
    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Deliver a webhook payload with a valid signature over the exact bytes
    /// sent.
    pub async fn deliver_webhook(&self, event: &Value) -> axum::response::Response {
        let payload = serde_json::to_vec(event).expect("failed to serialize webhook payload");
        let header = signature::sign(&payload, TEST_WEBHOOK_SECRET, Utc::now().timestamp());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header(signature::SIGNATURE_HEADER, header)
            .body(Body::from(payload))
            .expect("failed to build webhook request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook delivery")
    }

    /// Insert a catalog row directly.
    pub async fn seed_artwork(
        &self,
        title: &str,
        slug: &str,
        price: Decimal,
        inventory_count: i32,
        is_published: bool,
    ) -> artwork::Model {
        let now = Utc::now();
        artwork::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            slug: Set(slug.to_string()),
            description: Set(Some(format!("{} (test seed)", title))),
            price: Set(price),
            inventory_count: Set(inventory_count),
            is_published: Set(is_published),
            image_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed artwork for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not valid json")
}

/// Read a decimal field that may serialize as a string or a bare number.
pub fn dec_field(value: &Value, key: &str) -> Decimal {
    use std::str::FromStr;
    match &value[key] {
        Value::String(s) => Decimal::from_str(s).expect("field was not a decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("field was not decimal"),
        other => panic!("field {} was not a decimal: {:?}", key, other),
    }
}

/// A `payment_intent.succeeded` webhook envelope carrying a full metadata
/// payload for the given items.
pub fn succeeded_event(
    payment_intent_id: &str,
    checkout_session_id: Option<&str>,
    items: Value,
    subtotal: &str,
    shipping_cost: &str,
    tax_minor: Option<i64>,
) -> Value {
    let mut object = json!({
        "id": payment_intent_id,
        "amount": 0,
        "currency": "usd",
        "status": "succeeded",
        "metadata": {
            "metadata_version": "1",
            "customer_name": "Vera Molnar",
            "customer_email": "vera@example.com",
            "shipping_address": "{\"line1\":\"12 Rue des Arts\",\"city\":\"Paris\",\"postal_code\":\"75003\",\"country\":\"FR\"}",
            "billing_address": "{\"line1\":\"12 Rue des Arts\",\"city\":\"Paris\",\"postal_code\":\"75003\",\"country\":\"FR\"}",
            "items": items.to_string(),
            "subtotal": subtotal,
            "shipping_cost": shipping_cost,
            "tax_amount": "0",
            "total": "0",
        },
    });

    if let Some(session) = checkout_session_id {
        object["checkout_session"] = json!(session);
    }
    if let Some(tax) = tax_minor {
        object["automatic_tax"] = json!({
            "enabled": true,
            "amount": tax,
            "status": "complete",
        });
    }

    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "payment_intent.succeeded",
        "data": { "object": object },
    })
}
