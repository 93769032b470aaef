use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::services::contacts::CreateContactInput;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;

/// Creates the router for contact endpoints
pub fn contacts_routes() -> Router<AppState> {
    Router::new().route("/", get(list_contacts).post(create_contact))
}

/// Store a contact-form submission.
#[utoipa::path(
    post,
    path = "/api/v1/contacts",
    responses(
        (status = 201, description = "Contact message stored"),
        (status = 400, description = "Missing required fields", body = crate::errors::ErrorResponse)
    ),
    tag = "Contacts"
)]
pub async fn create_contact(
    State(state): State<AppState>,
    Json(payload): Json<CreateContactInput>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = state
        .services
        .contacts
        .create_contact(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(json!({
        "message": "Contact form submitted successfully",
        "id": contact.id
    })))
}

/// Back-office listing of contact messages, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/contacts",
    responses((status = 200, description = "Contact messages, newest first")),
    tag = "Contacts"
)]
pub async fn list_contacts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let contacts = state
        .services
        .contacts
        .list_contacts()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(contacts))
}
