use crate::{
    config::AppConfig,
    entities::{order, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    gateway::{CreateSessionRequest, PaymentGateway, SessionLineItem},
    services::orders::OrderService,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

/// Customer contact fields captured at checkout time; immutable once the
/// order row is written.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CustomerInfo {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
}

/// One cart line at checkout time. `product_id` is the historical reference;
/// name and price are the authoritative snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutLine {
    pub id: Option<Uuid>,
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    pub price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
}

/// Checkout request: amount in integer minor currency units plus the cart
/// snapshot and contact details.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(range(min = 1, message = "Amount must be a positive number of minor units"))]
    pub amount: i64,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: Option<String>,
    #[validate]
    pub customer: CustomerInfo,
    #[validate(length(min = 1, message = "Cart is empty"))]
    pub items: Vec<CheckoutLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSessionResponse {
    /// Opaque processor session id; the caller redirects to the hosted page
    pub id: String,
    /// Hosted payment page URL, when the processor returns one
    pub url: Option<String>,
    pub order_id: Uuid,
}

/// Converts a cart snapshot plus contact details into a durable PENDING
/// order and a hosted payment session keyed to it.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<OrderService>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<OrderService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            orders,
            config,
        }
    }

    /// Creates the pending order and the hosted payment session.
    ///
    /// On success exactly one PENDING order exists whose session reference
    /// equals the returned session id. If the processor call or the
    /// reference update fails after the order row was written, the orphaned
    /// row is deleted best-effort before the error surfaces.
    #[instrument(skip(self, request), fields(amount = request.amount))]
    pub async fn create_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSessionResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        for line in &request.items {
            line.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| self.config.default_currency.clone());
        let total = Decimal::new(request.amount, 2);

        let snapshot_total: Decimal = request
            .items
            .iter()
            .map(|i| i.price * Decimal::from(i.quantity))
            .sum();
        if snapshot_total != total {
            // Expected to reconcile, but the charged amount stays authoritative
            warn!(%snapshot_total, %total, "Cart snapshot total differs from checkout amount");
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            session_reference: Set(None),
            customer_name: Set(request.customer.name.clone()),
            customer_email: Set(request.customer.email.clone()),
            customer_phone: Set(request.customer.phone.clone()),
            shipping_address: Set(request.customer.address.clone()),
            total: Set(total),
            currency: Set(currency.clone()),
            status: Set(order::OrderStatus::Pending),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        order.insert(&txn).await?;

        for line in &request.items {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.id),
                name: Set(line.name.clone()),
                unit_price: Set(line.price),
                quantity: Set(line.quantity as i32),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;
        info!(order_id = %order_id, "Pending order created");

        let session_request = CreateSessionRequest {
            order_id,
            currency,
            customer_email: request.customer.email.clone(),
            line_items: request
                .items
                .iter()
                .map(|line| SessionLineItem {
                    name: line.name.clone(),
                    unit_amount_minor: to_minor_units(line.price),
                    quantity: line.quantity,
                })
                .collect(),
            success_url: self.config.checkout_success_url(),
            cancel_url: self.config.checkout_cancel_url(),
        };

        let session = match self.gateway.create_checkout_session(session_request).await {
            Ok(session) => session,
            Err(e) => {
                self.cleanup_orphaned_order(order_id).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .orders
            .attach_session_reference(order_id, &session.id)
            .await
        {
            self.cleanup_orphaned_order(order_id).await;
            return Err(e);
        }

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::CheckoutSessionCreated {
                order_id,
                session_reference: session.id.clone(),
            })
            .await;

        info!(order_id = %order_id, session_reference = %session.id, "Checkout session created");

        Ok(CheckoutSessionResponse {
            id: session.id,
            url: session.url,
            order_id,
        })
    }

    /// Best-effort removal of a pending order whose session never
    /// materialized. Failure is logged, not escalated.
    async fn cleanup_orphaned_order(&self, order_id: Uuid) {
        if let Err(e) = self.orders.delete_order(order_id).await {
            warn!(order_id = %order_id, "Failed to clean up orphaned pending order: {}", e);
        }
    }
}

/// Converts a major-unit decimal price to integer minor units.
fn to_minor_units(price: Decimal) -> i64 {
    (price * dec!(100)).round().to_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_customer() -> CustomerInfo {
        CustomerInfo {
            name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            phone: "+1 555 0100".into(),
            address: "123 Main St".into(),
        }
    }

    fn valid_request() -> CheckoutRequest {
        CheckoutRequest {
            amount: 1998,
            currency: Some("usd".into()),
            customer: valid_customer(),
            items: vec![CheckoutLine {
                id: Some(Uuid::new_v4()),
                name: "Widget".into(),
                price: dec!(9.99),
                quantity: 2,
            }],
        }
    }

    #[test]
    fn request_validation_requires_contact_fields_and_items() {
        assert!(valid_request().validate().is_ok());

        let mut missing_email = valid_request();
        missing_email.customer.email = "".into();
        assert!(missing_email.validate().is_err());

        let mut empty_cart = valid_request();
        empty_cart.items.clear();
        assert!(empty_cart.validate().is_err());

        let mut zero_amount = valid_request();
        zero_amount.amount = 0;
        assert!(zero_amount.validate().is_err());

        let mut zero_quantity = valid_request();
        zero_quantity.items[0].quantity = 0;
        assert!(zero_quantity.items[0].validate().is_err());
    }

    #[test]
    fn minor_unit_conversion_rounds_half_up() {
        assert_eq!(to_minor_units(dec!(9.99)), 999);
        assert_eq!(to_minor_units(dec!(10)), 1000);
        assert_eq!(to_minor_units(dec!(0.005)), 1);
    }

    #[test]
    fn amount_converts_to_exact_decimal_total() {
        assert_eq!(Decimal::new(1998, 2), dec!(19.98));
        assert_eq!(Decimal::new(100, 2), dec!(1.00));
    }

    mod with_database {
        use super::*;
        use crate::entities::{order::OrderStatus, Order};
        use crate::gateway::HostedSession;
        use sea_orm::{ConnectOptions, Database, EntityTrait};
        use sea_orm_migration::MigratorTrait;

        mockall::mock! {
            Gateway {}

            #[async_trait::async_trait]
            impl PaymentGateway for Gateway {
                async fn create_checkout_session(
                    &self,
                    request: CreateSessionRequest,
                ) -> Result<HostedSession, ServiceError>;
            }
        }

        async fn service_with(gateway: MockGateway) -> (CheckoutService, Arc<DatabaseConnection>) {
            let mut opt = ConnectOptions::new("sqlite::memory:");
            opt.max_connections(1);
            let db = Arc::new(Database::connect(opt).await.unwrap());
            crate::migrator::Migrator::up(&*db, None).await.unwrap();

            let (event_sender, event_rx) = crate::events::channel(16);
            drop(event_rx);

            let config = Arc::new(crate::config::AppConfig::new(
                "sqlite::memory:".into(),
                "sk_test".into(),
                "127.0.0.1".into(),
                8080,
                "development".into(),
            ));
            let orders = Arc::new(OrderService::new(db.clone(), None));
            let service = CheckoutService::new(
                db.clone(),
                Arc::new(event_sender),
                Arc::new(gateway),
                orders,
                config,
            );
            (service, db)
        }

        #[tokio::test]
        async fn success_leaves_one_pending_order_keyed_to_the_session() {
            let mut gateway = MockGateway::new();
            gateway
                .expect_create_checkout_session()
                .withf(|req| req.line_items.len() == 1 && req.line_items[0].unit_amount_minor == 999)
                .times(1)
                .returning(|_| {
                    Ok(HostedSession {
                        id: "cs_unit_test".to_string(),
                        url: None,
                    })
                });

            let (service, db) = service_with(gateway).await;
            let response = service.create_session(valid_request()).await.unwrap();

            assert_eq!(response.id, "cs_unit_test");
            let orders = Order::find().all(&*db).await.unwrap();
            assert_eq!(orders.len(), 1);
            assert_eq!(orders[0].status, OrderStatus::Pending);
            assert_eq!(orders[0].session_reference.as_deref(), Some("cs_unit_test"));
        }

        #[tokio::test]
        async fn gateway_failure_rolls_back_the_pending_order() {
            let mut gateway = MockGateway::new();
            gateway.expect_create_checkout_session().times(1).returning(|_| {
                Err(ServiceError::ExternalServiceError(
                    "processor down".to_string(),
                ))
            });

            let (service, db) = service_with(gateway).await;
            let err = service.create_session(valid_request()).await.unwrap_err();

            assert!(matches!(err, ServiceError::ExternalServiceError(_)));
            assert!(Order::find().all(&*db).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn validation_failure_never_reaches_the_gateway() {
            let mut gateway = MockGateway::new();
            gateway.expect_create_checkout_session().times(0);

            let (service, db) = service_with(gateway).await;
            let mut request = valid_request();
            request.customer.address = "".into();

            let err = service.create_session(request).await.unwrap_err();
            assert!(matches!(err, ServiceError::ValidationError(_)));
            assert!(Order::find().all(&*db).await.unwrap().is_empty());
        }
    }
}
