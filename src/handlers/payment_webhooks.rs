use crate::gateway::{
    signature::SIGNATURE_HEADER, WebhookEvent, WebhookVerifier, CHECKOUT_SESSION_COMPLETED,
};
use crate::services::orders::ReconcileOutcome;
use crate::{errors::ServiceError, AppState};
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};

/// Payment processor webhook: the only writer allowed to move an order from
/// PENDING to COMPLETED.
///
/// Delivery is at-least-once, so replays of an already-completed session are
/// acknowledged without mutation. Unsubscribed-but-delivered event types are
/// acknowledged too; anything else makes the sender retry forever.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Missing signature, unverifiable configuration, or malformed event", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Event references an unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let Some(secret) = state.config.payment_webhook_secret.clone() else {
        warn!("Webhook received but no signing secret is configured");
        return Err(ServiceError::BadRequest(
            "webhook verification is not configured".to_string(),
        ));
    };

    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!("Webhook received without a signature header");
        return Err(ServiceError::BadRequest(
            "missing webhook signature header".to_string(),
        ));
    };

    let verifier = WebhookVerifier::new(secret, state.config.payment_webhook_tolerance_secs);
    if let Err(e) = verifier.verify(signature, &body) {
        warn!("Webhook signature verification failed: {}", e);
        return Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let event = WebhookEvent::parse(&body)?;

    if event.event_type != CHECKOUT_SESSION_COMPLETED {
        info!(event_type = %event.event_type, "Acknowledging unhandled webhook event type");
        return Ok(Json(json!({ "received": true })));
    }

    let session = event.data.object;
    let Some(order_id) = session.order_reference() else {
        warn!(session_reference = %session.id, "Completed session carries no order reference");
        return Err(ServiceError::BadRequest(
            "no order reference in event metadata".to_string(),
        ));
    };

    let outcome = state
        .services
        .orders
        .reconcile_session_completed(&session.id, order_id)
        .await?;

    let order = match &outcome {
        ReconcileOutcome::Completed(order) => order,
        ReconcileOutcome::AlreadyCompleted(order) => order,
    };

    Ok(Json(json!({ "received": true, "order_id": order.id })))
}
