use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Backend for a storefront: product catalog, contact messages, hosted-payment
checkout, and asynchronous order reconciliation.

## Checkout flow

1. `POST /api/v1/checkout/session` creates a PENDING order and a hosted
   payment session; redirect the shopper to the processor using the returned
   session id.
2. The processor calls `POST /api/v1/payments/webhook` asynchronously; a
   verified `checkout.session.completed` event flips the order to COMPLETED
   exactly once.
3. The success page polls `GET /api/v1/orders/by-session/{id}`; a 404 means
   the webhook has not landed yet, not a failure.

## Error Handling

Errors use a consistent JSON shape with the request id for support:

```json
{
  "error": "Bad Request",
  "message": "Validation failed",
  "request_id": "req-abc123",
  "timestamp": "2025-08-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Hosted-payment session creation"),
        (name = "Payments", description = "Payment processor webhook"),
        (name = "Orders", description = "Order lookup and back office"),
        (name = "Products", description = "Catalog management"),
        (name = "Contacts", description = "Contact form storage"),
        (name = "Uploads", description = "Image upload passthrough"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::checkout::create_checkout_session,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order_by_session,
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::contacts::create_contact,
        crate::handlers::contacts::list_contacts,
        crate::handlers::uploads::upload_image,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::checkout::CheckoutRequest,
        crate::services::checkout::CustomerInfo,
        crate::services::checkout::CheckoutLine,
        crate::services::checkout::CheckoutSessionResponse,
    ))
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
