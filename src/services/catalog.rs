use crate::{
    entities::{category, product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct CreateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    /// Attach to an existing category by id...
    pub category_id: Option<Uuid>,
    /// ...or connect-or-create one by name
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// A product joined with its category for listing surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithCategory {
    #[serde(flatten)]
    pub product: product::Model,
    pub category: Option<category::Model>,
}

/// Catalog CRUD consumed by the storefront pages and the back office. The
/// checkout flow only reads it to snapshot identity and price at
/// cart-add time.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product, attaching it to an existing category by id or
    /// connecting-or-creating one by name.
    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductWithCategory, ServiceError> {
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("Name and price are required".to_string())
            })?
            .to_string();
        let price = input.price.ok_or_else(|| {
            ServiceError::ValidationError("Name and price are required".to_string())
        })?;
        if price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be greater than zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let category = match (input.category_id, input.category_name.as_deref()) {
            (Some(id), _) => category::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))?,
            (None, Some(name)) if !name.trim().is_empty() => {
                self.find_or_create_category(&txn, name.trim()).await?
            }
            _ => {
                return Err(ServiceError::ValidationError(
                    "Either category_id or category_name is required".to_string(),
                ))
            }
        };

        let product_id = Uuid::new_v4();
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(product_id),
            name: Set(name),
            description: Set(input.description),
            price: Set(price),
            image_url: Set(input.image_url),
            category_id: Set(category.id),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let created = model.insert(&txn).await?;

        txn.commit().await?;

        info!(product_id = %product_id, "Product created");
        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        Ok(ProductWithCategory {
            product: created,
            category: Some(category),
        })
    }

    async fn find_or_create_category<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
    ) -> Result<category::Model, ServiceError> {
        if let Some(existing) = category::Entity::find()
            .filter(category::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(existing);
        }

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(format!("{} products", name))),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(conn).await?)
    }

    /// Lists all products with their categories, newest first.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<ProductWithCategory>, ServiceError> {
        let rows = product::Entity::find()
            .find_also_related(category::Entity)
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, category)| ProductWithCategory { product, category })
            .collect())
    }

    /// Fetches a single product with its category.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductWithCategory>, ServiceError> {
        let row = product::Entity::find_by_id(product_id)
            .find_also_related(category::Entity)
            .one(&*self.db)
            .await?;

        Ok(row.map(|(product, category)| ProductWithCategory { product, category }))
    }

    /// Applies a partial update; untouched fields keep their values.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be greater than zero".to_string(),
                ));
            }
        }

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&*self.db).await?;

        info!(product_id = %product_id, "Product updated");
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(updated)
    }

    /// Deletes a product. Historical order items keep their snapshots; their
    /// product references dangle from here on.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        product::Entity::delete_by_id(existing.id)
            .exec(&*self.db)
            .await?;

        info!(product_id = %product_id, "Product deleted");
        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        Ok(())
    }
}
