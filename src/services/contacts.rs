use crate::{
    entities::contact,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateContactInput {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

/// Stores contact-form submissions for the back office.
#[derive(Clone)]
pub struct ContactService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ContactService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_contact(
        &self,
        input: CreateContactInput,
    ) -> Result<contact::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let contact_id = Uuid::new_v4();
        let model = contact::ActiveModel {
            id: Set(contact_id),
            name: Set(input.name),
            email: Set(input.email),
            phone: Set(input.phone.filter(|p| !p.trim().is_empty())),
            subject: Set(input.subject),
            message: Set(input.message),
            created_at: Set(Utc::now()),
        };

        let created = model.insert(&*self.db).await?;

        info!(contact_id = %contact_id, "Contact message stored");
        self.event_sender
            .send_or_log(Event::ContactReceived(contact_id))
            .await;

        Ok(created)
    }

    /// Lists contact messages, newest first.
    #[instrument(skip(self))]
    pub async fn list_contacts(&self) -> Result<Vec<contact::Model>, ServiceError> {
        Ok(contact::Entity::find()
            .order_by_desc(contact::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}
