use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    events,
    gateway::{signature::SIGNATURE_HEADER, StripeGateway, WebhookVerifier},
    handlers::AppServices,
    AppState,
};
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Webhook signing secret shared between tests and the app under test
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Helper harness: app state over a fresh SQLite database plus a wiremock
/// server standing in for the payment processor.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub gateway_server: MockServer,
    _tmp: tempfile::TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::new_with(|_| {}).await
    }

    /// Same, with a configuration tweak applied before startup.
    pub async fn new_with(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let tmp = tempfile::TempDir::new().expect("failed to create temp dir");
        let db_file = tmp.path().join("storefront_test.db");

        let gateway_server = MockServer::start().await;

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "sk_test_key".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.payment_api_base = gateway_server.uri();
        cfg.payment_webhook_secret = Some(WEBHOOK_SECRET.to_string());
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let db_arc = Arc::new(pool);
        let cfg = Arc::new(cfg);
        let gateway = Arc::new(StripeGateway::new(
            cfg.payment_api_base.clone(),
            cfg.payment_secret_key.clone(),
        ));
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            gateway,
            cfg.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway_server,
            _tmp: tmp,
            _event_task: event_task,
        }
    }

    /// Mounts a processor mock that returns a hosted session with this id.
    pub async fn mock_session_created(&self, session_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": session_id,
                "url": format!("https://checkout.test/pay/{session_id}")
            })))
            // Serve this specific session once: wiremock resolves overlapping
            // mocks oldest-first, so without a per-mock limit a second checkout
            // would reuse the first session id and collide on the unique
            // session_reference index. One response per mounted session lets
            // successive checkouts each receive their own id.
            .up_to_n_times(1)
            .mount(&self.gateway_server)
            .await;
    }

    /// Mounts a processor mock that rejects session creation.
    pub async fn mock_session_failure(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
                "error": { "message": "Your card processor is unhappy" }
            })))
            .mount(&self.gateway_server)
            .await;
    }

    /// Sends a JSON request and returns (status, parsed body).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("request failed");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Delivers a raw webhook body, optionally with a signature header.
    pub async fn deliver_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json");
        if let Some(header) = signature_header {
            builder = builder.header(SIGNATURE_HEADER, header);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::from(payload.to_vec())).unwrap())
            .await
            .expect("request failed");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Verifier configured with the test webhook secret; used to produce
    /// valid signature headers.
    pub fn webhook_verifier(&self) -> WebhookVerifier {
        WebhookVerifier::new(WEBHOOK_SECRET, 300)
    }
}

/// A checkout request body matching the README scenario: two widgets at 9.99.
pub fn widget_checkout_body() -> Value {
    serde_json::json!({
        "amount": 1998,
        "currency": "usd",
        "customer": {
            "name": "Jane Doe",
            "email": "jane@example.com",
            "phone": "+1 555 0100",
            "address": "123 Main St, Springfield"
        },
        "items": [
            { "id": uuid::Uuid::new_v4(), "name": "Widget", "price": "9.99", "quantity": 2 }
        ]
    })
}

/// A signed `checkout.session.completed` event for the given session/order.
pub fn session_completed_event(session_id: &str, order_id: Option<&str>) -> Vec<u8> {
    let mut object = serde_json::json!({ "id": session_id });
    if let Some(order_id) = order_id {
        object["metadata"] = serde_json::json!({ "order_id": order_id });
    }
    serde_json::json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "data": { "object": object }
    })
    .to_string()
    .into_bytes()
}
