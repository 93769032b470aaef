use crate::{
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus,
    },
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// An order with its line-item snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderWithItems>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Result of reconciling a completed payment session against local state.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// This delivery performed the PENDING -> COMPLETED transition
    Completed(OrderModel),
    /// A previous delivery already completed the order; nothing was mutated
    AlreadyCompleted(OrderModel),
}

/// Order data access: queries for the success page and back office, plus the
/// single state transition the webhook reconciler is allowed to perform.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Retrieves an order and its items by external session reference.
    ///
    /// Read-only. A `None` here is not an error state for callers: the
    /// success-page redirect regularly races the webhook, so "not found"
    /// means "still pending" to them.
    #[instrument(skip(self))]
    pub async fn get_order_by_session(
        &self,
        session_reference: &str,
    ) -> Result<Option<OrderWithItems>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::SessionReference.eq(session_reference))
            .one(&*self.db)
            .await?;

        let Some(order) = order else {
            info!(session_reference, "No order for session yet");
            return Ok(None);
        };

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;

        Ok(Some(OrderWithItems { order, items }))
    }

    /// Lists orders with their items, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let paginator = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
        if !order_ids.is_empty() {
            for item in OrderItemEntity::find()
                .filter(order_item::Column::OrderId.is_in(order_ids))
                .all(&*self.db)
                .await?
            {
                items_by_order.entry(item.order_id).or_default().push(item);
            }
        }

        let orders = orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect();

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Stores the processor-assigned session reference on a freshly created
    /// pending order.
    #[instrument(skip(self))]
    pub async fn attach_session_reference(
        &self,
        order_id: Uuid,
        session_reference: &str,
    ) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: OrderActiveModel = order.into();
        active.session_reference = Set(Some(session_reference.to_string()));
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        Ok(())
    }

    /// Transitions a pending order to COMPLETED, exactly once.
    ///
    /// The transition is a conditional update keyed on `status = PENDING`;
    /// concurrent deliveries of the same event race on rows_affected instead
    /// of on a read-then-write. `order_id` comes from the verified event's
    /// metadata, `session_reference` from the session object itself; when an
    /// order already carries the session reference the two must agree.
    #[instrument(skip(self))]
    pub async fn reconcile_session_completed(
        &self,
        session_reference: &str,
        order_id: Uuid,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if let Some(existing) = OrderEntity::find()
            .filter(order::Column::SessionReference.eq(session_reference))
            .one(&*self.db)
            .await?
        {
            if existing.id != order_id {
                warn!(
                    session_reference,
                    metadata_order_id = %order_id,
                    session_order_id = %existing.id,
                    "Webhook metadata does not match the order holding this session"
                );
                return Err(ServiceError::BadRequest(
                    "event metadata does not match session owner".to_string(),
                ));
            }
            if existing.status == OrderStatus::Completed {
                info!(order_id = %existing.id, "Order already completed; replay acknowledged");
                return Ok(ReconcileOutcome::AlreadyCompleted(existing));
            }
        }

        let result = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Completed))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 1 {
            let completed = OrderEntity::find_by_id(order_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "order {} vanished after completion",
                        order_id
                    ))
                })?;

            info!(order_id = %order_id, session_reference, "Order completed");
            if let Some(event_sender) = &self.event_sender {
                event_sender.send_or_log(Event::OrderCompleted(order_id)).await;
            }
            return Ok(ReconcileOutcome::Completed(completed));
        }

        // Lost the conditional update: either a concurrent delivery won, the
        // order was cancelled, or the reference never matched an order.
        match OrderEntity::find_by_id(order_id).one(&*self.db).await? {
            Some(order) if order.status == OrderStatus::Completed => {
                info!(order_id = %order_id, "Concurrent delivery completed the order first");
                Ok(ReconcileOutcome::AlreadyCompleted(order))
            }
            Some(order) => Err(ServiceError::Conflict(format!(
                "order {} is {} and cannot be completed",
                order_id, order.status
            ))),
            None => Err(ServiceError::NotFound(format!(
                "no order {} for session {}",
                order_id, session_reference
            ))),
        }
    }

    /// Deletes an order and its items. Compensating cleanup for checkout
    /// failures; not exposed over HTTP.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        let result = OrderEntity::delete_by_id(order_id).exec(&txn).await?;

        txn.commit().await?;

        if result.rows_affected == 0 {
            warn!(order_id = %order_id, "Delete requested for missing order");
        } else {
            info!(order_id = %order_id, "Order deleted");
        }
        Ok(())
    }
}
