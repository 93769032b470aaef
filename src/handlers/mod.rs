pub mod checkout;
pub mod common;
pub mod contacts;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod uploads;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateway::PaymentGateway;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::ProductCatalogService>,
    pub checkout: Arc<crate::services::CheckoutService>,
    pub orders: Arc<crate::services::OrderService>,
    pub contacts: Arc<crate::services::ContactService>,
    pub media: Arc<crate::services::MediaService>,
}

impl AppServices {
    /// Build the services container shared across handlers.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        let catalog = Arc::new(crate::services::ProductCatalogService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(crate::services::OrderService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let checkout = Arc::new(crate::services::CheckoutService::new(
            db_pool.clone(),
            event_sender.clone(),
            gateway,
            orders.clone(),
            config.clone(),
        ));
        let contacts = Arc::new(crate::services::ContactService::new(db_pool, event_sender));
        let media = Arc::new(crate::services::MediaService::new(config));

        Self {
            catalog,
            checkout,
            orders,
            contacts,
            media,
        }
    }
}
