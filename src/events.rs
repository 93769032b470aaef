use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services. Consumed by a logging processor
/// task today; the enum is the integration point for anything downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order lifecycle
    OrderCreated(Uuid),
    OrderCompleted(Uuid),
    OrderCancelled(Uuid),
    CheckoutSessionCreated {
        order_id: Uuid,
        session_reference: String,
    },

    // Catalog
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // CRM
    ContactReceived(Uuid),
}

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

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Event delivery is best-effort; it never blocks a request path.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(?event, "Dropping event: {}", e);
        }
    }
}

/// Builds an event channel pair sized from configuration.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Background task draining the event channel.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(id) => info!(order_id = %id, "event: order created"),
            Event::OrderCompleted(id) => info!(order_id = %id, "event: order completed"),
            Event::OrderCancelled(id) => info!(order_id = %id, "event: order cancelled"),
            Event::CheckoutSessionCreated {
                order_id,
                session_reference,
            } => info!(
                order_id = %order_id,
                session_reference = %session_reference,
                "event: checkout session created"
            ),
            Event::ProductCreated(id) => info!(product_id = %id, "event: product created"),
            Event::ProductUpdated(id) => info!(product_id = %id, "event: product updated"),
            Event::ProductDeleted(id) => info!(product_id = %id, "event: product deleted"),
            Event::ContactReceived(id) => info!(contact_id = %id, "event: contact received"),
        }
    }
    info!("Event channel closed; processor exiting");
}
