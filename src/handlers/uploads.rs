use crate::handlers::common::{map_service_error, success_response};
use crate::services::media::MAX_UPLOAD_BYTES;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::post,
    Router,
};

/// Creates the router for image upload passthrough
pub fn uploads_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_image))
        // Multipart envelope overhead on top of the image size cap
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}

/// Accepts a multipart `file` field and forwards it to the media host.
#[utoipa::path(
    post,
    path = "/api/v1/uploads",
    responses(
        (status = 200, description = "Hosted image URL"),
        (status = 400, description = "Missing file, wrong type, or too large", body = crate::errors::ErrorResponse),
        (status = 502, description = "Media host unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Uploads"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest {
            message: format!("Unreadable multipart body: {}", e),
        }
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ApiError::BadRequest {
                message: "File must be an image".to_string(),
            });
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(|e| ApiError::BadRequest {
            message: format!("Unreadable file field: {}", e),
        })?;

        if data.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest {
                message: "File size must be less than 5MB".to_string(),
            });
        }

        let uploaded = state
            .services
            .media
            .upload_image(data.to_vec(), filename)
            .await
            .map_err(map_service_error)?;

        return Ok(success_response(uploaded));
    }

    Err(ApiError::BadRequest {
        message: "No file provided".to_string(),
    })
}
