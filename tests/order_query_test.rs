mod common;

use axum::http::{Method, StatusCode};
use common::{session_completed_event, widget_checkout_body, TestApp};

#[tokio::test]
async fn unknown_session_reads_as_not_found_for_the_success_page() {
    let app = TestApp::new().await;

    // The redirect from the hosted page can beat the webhook; the success
    // page treats this as "still processing", so it is a plain 404, not 500.
    let (status, body) = app
        .request(Method::GET, "/api/v1/orders/by-session/cs_unseen", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("cs_unseen"));
}

#[tokio::test]
async fn pending_order_is_readable_before_the_webhook_lands() {
    let app = TestApp::new().await;
    app.mock_session_created("cs_early_redirect").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/checkout/session",
            Some(widget_checkout_body()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/orders/by-session/cs_early_redirect",
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["name"], "Widget");
}

#[tokio::test]
async fn completed_order_returns_with_items_after_reconciliation() {
    let app = TestApp::new().await;
    app.mock_session_created("cs_done").await;

    let (_, checkout_body) = app
        .request(
            Method::POST,
            "/api/v1/checkout/session",
            Some(widget_checkout_body()),
        )
        .await;
    let order_id = checkout_body["order_id"].as_str().unwrap().to_string();

    let payload = session_completed_event("cs_done", Some(&order_id));
    let header = app.webhook_verifier().signature_header(&payload);
    let (status, _) = app.deliver_webhook(&payload, Some(&header)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::GET, "/api/v1/orders/by-session/cs_done", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["session_reference"], "cs_done");
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn back_office_listing_returns_orders_newest_first() {
    let app = TestApp::new().await;

    for session in ["cs_first", "cs_second"] {
        app.gateway_server.reset().await;
        app.mock_session_created(session).await;
        let (status, _) = app
            .request(
                Method::POST,
                "/api/v1/checkout/session",
                Some(widget_checkout_body()),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.request(Method::GET, "/api/v1/orders", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    for order in orders {
        assert_eq!(order["items"].as_array().unwrap().len(), 1);
    }
}
