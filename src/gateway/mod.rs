//! Hosted-payment processor integration.
//!
//! The service never touches card data; it creates a hosted checkout session
//! at the processor and later reconciles the processor's signed
//! `checkout.session.completed` callback against the local order.

pub mod signature;
pub mod stripe;

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

pub use signature::{SignatureError, WebhookVerifier};
pub use stripe::StripeGateway;

/// Metadata key carrying the local order reference through the processor.
pub const METADATA_ORDER_ID: &str = "order_id";

/// Event type that triggers order reconciliation. Every other subscribed
/// event type is acknowledged and ignored.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Display data for one line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineItem {
    pub name: String,
    /// Unit price in minor currency units (integer, no floating point drift)
    pub unit_amount_minor: i64,
    pub quantity: u32,
}

/// Input for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    /// Local order reference embedded in session metadata; the join key the
    /// reconciler uses later
    pub order_id: Uuid,
    pub currency: String,
    pub customer_email: String,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted session handle returned by the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Seam to the external payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<HostedSession, ServiceError>;
}

/// Verified webhook event envelope. The schema is the processor's; only the
/// fields this service consumes are modeled.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: SessionObject,
}

/// The checkout-session object inside a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionObject {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionObject {
    /// Extracts the embedded order reference, if present and well-formed.
    pub fn order_reference(&self) -> Option<Uuid> {
        self.metadata
            .get(METADATA_ORDER_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, ServiceError> {
        serde_json::from_slice(payload)
            .map_err(|e| ServiceError::BadRequest(format!("invalid webhook payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_completed_event_and_order_reference() {
        let order_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "metadata": { "order_id": order_id.to_string() }
                }
            }
        });

        let event = WebhookEvent::parse(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.event_type, CHECKOUT_SESSION_COMPLETED);
        assert_eq!(event.data.object.id, "cs_test_123");
        assert_eq!(event.data.object.order_reference(), Some(order_id));
    }

    #[test]
    fn missing_or_garbled_metadata_yields_no_order_reference() {
        let no_metadata = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1" } }
        });
        let event = WebhookEvent::parse(no_metadata.to_string().as_bytes()).unwrap();
        assert_eq!(event.data.object.order_reference(), None);

        let garbled = serde_json::json!({
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_2", "metadata": { "order_id": "not-a-uuid" } } }
        });
        let event = WebhookEvent::parse(garbled.to_string().as_bytes()).unwrap();
        assert_eq!(event.data.object.order_reference(), None);
    }

    #[test]
    fn rejects_non_json_payloads() {
        assert!(WebhookEvent::parse(b"not json").is_err());
    }
}
