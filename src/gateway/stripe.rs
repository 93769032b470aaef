//! Stripe-flavored HTTP client for hosted checkout sessions.
//!
//! Only the session-creation call is implemented; the payment UI and card
//! handling live entirely on the processor's side. The API base is injected
//! from configuration so integration tests can point it at a local mock.

use crate::errors::ServiceError;
use crate::gateway::{CreateSessionRequest, HostedSession, PaymentGateway, METADATA_ORDER_ID};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default)]
    error: Option<GatewayErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    #[serde(default)]
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client construction cannot fail with static options"),
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.api_base.trim_end_matches('/')
        )
    }
}

/// Flattens the session request into the processor's form-encoded shape.
fn session_form(request: &CreateSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "customer_email".to_string(),
            request.customer_email.clone(),
        ),
        // Compact order reference only; never the full cart
        (
            format!("metadata[{}]", METADATA_ORDER_ID),
            request.order_id.to_string(),
        ),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        form.push((
            format!("line_items[{}][price_data][currency]", i),
            request.currency.clone(),
        ));
        form.push((
            format!("line_items[{}][price_data][unit_amount]", i),
            item.unit_amount_minor.to_string(),
        ));
        form.push((
            format!("line_items[{}][price_data][product_data][name]", i),
            item.name.clone(),
        ));
        form.push((format!("line_items[{}][quantity]", i), item.quantity.to_string()));
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<HostedSession, ServiceError> {
        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.secret_key)
            .form(&session_form(&request))
            .send()
            .await
            .map_err(|e| {
                warn!("Checkout session request failed to send: {}", e);
                ServiceError::ExternalServiceError(format!("payment processor unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<GatewayErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.and_then(|e| e.message))
                .unwrap_or_else(|| format!("processor returned {}", status));
            warn!(%status, "Checkout session creation rejected: {}", message);
            return Err(ServiceError::ExternalServiceError(message));
        }

        response.json::<HostedSession>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("unparseable session response: {}", e))
        })
    }
}
