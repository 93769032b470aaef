use crate::handlers::common::{map_service_error, success_response, PaginationParams};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/by-session/:session_reference", get(get_order_by_session))
}

/// Back-office listing of all orders with their items, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders with items, newest first")
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(pagination.page(), pagination.per_page())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Success-page lookup by hosted-session reference.
///
/// Returns 404 while the webhook has not yet reconciled the session; the
/// redirect from the hosted payment page routinely beats the webhook, so
/// callers should treat 404 as "still processing", not as a failure.
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-session/{session_reference}",
    params(("session_reference" = String, Path, description = "Hosted-session reference")),
    responses(
        (status = 200, description = "Order with items"),
        (status = 404, description = "No order for this session yet", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_by_session(
    State(state): State<AppState>,
    Path(session_reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order_by_session(&session_reference)
        .await
        .map_err(map_service_error)?;

    match order {
        Some(order) => Ok(success_response(order)),
        None => Err(ApiError::NotFound(format!(
            "No order for session {}",
            session_reference
        ))),
    }
}
