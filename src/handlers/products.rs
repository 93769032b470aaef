use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::services::catalog::{CreateProductInput, UpdateProductInput};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use uuid::Uuid;

/// Creates the router for catalog endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

/// Storefront and back-office product listing with categories.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses((status = 200, description = "All products with categories, newest first")),
    tag = "Products"
)]
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .list_products()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    match product {
        Some(product) => Ok(success_response(product)),
        None => Err(ApiError::NotFound(format!("Product {} not found", id))),
    }
}

/// Create a product, attaching it to a category by id or by name.
#[utoipa::path(
    post,
    path = "/api/v1/products",
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Missing name, price, or category", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .update_product(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(json!({ "product": product })))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .catalog
        .delete_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(json!({
        "success": true,
        "message": "Product deleted successfully"
    })))
}
