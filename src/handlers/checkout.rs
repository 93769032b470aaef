use crate::handlers::common::{map_service_error, validate_input};
use crate::services::checkout::{CheckoutRequest, CheckoutSessionResponse};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/session", post(create_checkout_session))
}

/// Create a pending order and a hosted payment session for it. The caller
/// redirects the shopper to the processor's page using the returned id.
#[utoipa::path(
    post,
    path = "/api/v1/checkout/session",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Hosted session created", body = CheckoutSessionResponse),
        (status = 400, description = "Invalid checkout payload", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment processor unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let session = state
        .services
        .checkout
        .create_session(payload)
        .await
        .map_err(map_service_error)?;

    Ok(Json(session))
}
