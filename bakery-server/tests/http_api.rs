//! HTTP surface tests over the in-memory engine: JSON shapes, status codes,
//! and the insufficient-stock payload the storefront UI depends on.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use bakery_server::{Server, ServerState};

async fn app() -> Router {
    Server::router(ServerState::for_tests().await)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn croissant(quantity: u32) -> Value {
    json!({
        "id": "croissant",
        "name": "Croissant",
        "price": 2.5,
        "wholesale_price": null,
        "unit_kind": "UNIT",
        "is_visible": true,
        "stock": { "kind": "SIMPLE", "quantity": quantity, "in_stock": quantity > 0 }
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn product_crud_round_trip() {
    let app = app().await;

    let (status, created) = send(&app, "POST", "/api/products", Some(croissant(10))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], "croissant");

    let (status, fetched) = send(&app, "GET", "/api/products/croissant", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["stock"]["quantity"], 10.0);

    let (status, _) = send(&app, "GET", "/api/products/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Creating the same key twice is a conflict
    let (status, body) = send(&app, "POST", "/api/products", Some(croissant(10))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "E0004");
}

#[tokio::test]
async fn checkout_and_cancel_through_the_api() {
    let app = app().await;
    send(&app, "POST", "/api/products", Some(croissant(10))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/checkout",
        Some(json!({
            "lines": [{ "line_id": "croissant", "name": "Croissant", "quantity": 4 }],
            "customer": { "name": "Ada" },
            "channel": "WEB"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order_id = body["order_id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, "GET", "/api/products/croissant", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["stock"]["quantity"], 6.0);

    let (status, order) = send(
        &app,
        "PUT",
        &format!("/api/orders/{order_id}/status"),
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CANCELLED");

    let (_, fetched) = send(&app, "GET", "/api/products/croissant", None).await;
    assert_eq!(fetched["stock"]["quantity"], 10.0);

    let (status, movements) = send(&app, "GET", "/api/stock-movements", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(movements.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn insufficient_stock_names_the_line_in_the_conflict_payload() {
    let app = app().await;
    send(&app, "POST", "/api/products", Some(croissant(3))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/checkout",
        Some(json!({
            "lines": [{ "line_id": "croissant", "name": "Croissant", "quantity": 5 }],
            "channel": "WEB"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "E4001");
    assert_eq!(body["data"]["lineId"], "croissant");
    assert_eq!(body["data"]["requested"], 5.0);
    assert_eq!(body["data"]["available"], 3.0);
}

#[tokio::test]
async fn manual_adjustment_via_the_api_leaves_an_audit_entry() {
    let app = app().await;
    send(&app, "POST", "/api/products", Some(croissant(10))).await;

    let (status, product) = send(
        &app,
        "POST",
        "/api/products/croissant/adjust",
        Some(json!({ "new_quantity": 7, "reason": "stocktake" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"]["quantity"], 7.0);

    let (status, movements) = send(&app, "GET", "/api/products/croissant/movements", None).await;
    assert_eq!(status, StatusCode::OK);
    let movements = movements.as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["type"], "OUT");
    assert_eq!(movements[0]["reason"], "stocktake");
}
