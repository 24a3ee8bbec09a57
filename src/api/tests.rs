use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::auth::{ROLE_HEADER, UID_HEADER};
use super::router;
use crate::app_system::{OrderSystem, SystemSettings};
use crate::domain::{ProductCreate, Role, UserCreate};
use crate::mock_framework::ScriptedGateway;

async fn setup() -> (Router, OrderSystem) {
    let system = OrderSystem::new(SystemSettings::default(), Arc::new(ScriptedGateway::new()));
    system
        .product_client
        .insert_product("1".into(), ProductCreate::new("Wireless Headphones", Decimal::new(19999, 2), 10))
        .await
        .unwrap();
    for uid in ["root", "alice", "bob"] {
        let profile = UserCreate { display_name: uid.into(), email: format!("{uid}@example.com") };
        system.user_client.create_user(uid.into(), profile).await.unwrap();
    }
    system.user_client.set_role("root".into(), Role::Admin).await.unwrap();
    (router(system.app_state()), system)
}

fn request(method: &str, uri: &str, uid: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(uid) = uid {
        builder = builder.header(UID_HEADER, uid);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn cart(quantity: u32) -> Value {
    json!({
        "items": [{"productId": "1", "quantity": quantity, "price": 1}],
        "shipping": {"name": "Alice", "address": "Kenyatta Avenue, Nairobi", "phone": "+254 712 345 678"},
        "paymentMethod": "MPESA"
    })
}

fn stk_callback(checkout_request_id: &str, result_code: i64) -> Value {
    json!({"Body": {"stkCallback": {
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": checkout_request_id,
        "ResultCode": result_code,
        "ResultDesc": "processed",
        "CallbackMetadata": {"Item": [{"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"}]}
    }}})
}

#[tokio::test]
async fn health_needs_no_identity() {
    let (app, _system) = setup().await;
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn checkout_prices_from_catalog_and_reserves_stock() {
    let (app, _system) = setup().await;

    let (status, body) = send(&app, request("POST", "/checkout", Some("alice"), Some(cart(2)))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["total"], "399.98");
    assert_eq!(body["status"], "Pending Payment");
    assert_eq!(body["payment"], "initiated");
    assert_eq!(body["checkoutRequestId"], "ws_CO_1");

    let (_, product) = send(&app, request("GET", "/products/1", None, None)).await;
    assert_eq!(product["stock"], 8);

    let (_, orders) = send(&app, request("GET", "/orders", Some("alice"), None)).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["items"][0]["unitPrice"], "199.99");
}

#[tokio::test]
async fn checkout_errors_map_to_statuses() {
    let (app, _system) = setup().await;

    let (status, _) = send(&app, request("POST", "/checkout", None, Some(cart(1)))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, request("POST", "/checkout", Some("alice"), Some(cart(15)))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));

    let mut unknown = cart(1);
    unknown["items"][0]["productId"] = json!("404");
    let (status, _) = send(&app, request("POST", "/checkout", Some("alice"), Some(unknown))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("POST", "/checkout", Some("alice"), Some(json!({"items": "nope"})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, product) = send(&app, request("GET", "/products/1", None, None)).await;
    assert_eq!(product["stock"], 10);
}

#[tokio::test]
async fn callback_marks_order_paid_and_always_acknowledges() {
    let (app, _system) = setup().await;
    let (_, receipt) = send(&app, request("POST", "/checkout", Some("alice"), Some(cart(1)))).await;
    let order_uri = format!("/orders/{}", receipt["orderId"].as_str().unwrap());

    for _ in 0..2 {
        let (status, body) = send(&app, request("POST", "/payments/mpesa/callback", None, Some(stk_callback("ws_CO_1", 0)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "ok"}));
    }
    let (_, order) = send(&app, request("GET", &order_uri, Some("alice"), None)).await;
    assert_eq!(order["status"], "Paid");
    assert_eq!(order["mpesaReceipt"], "NLJ7RT61SV");

    let (status, _) = send(&app, request("POST", "/payments/mpesa/callback", None, Some(stk_callback("ws_CO_404", 0)))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request("POST", "/payments/mpesa/callback", None, Some(json!({"Body": {}})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn orders_are_private_to_owner_and_admins() {
    let (app, _system) = setup().await;
    let (_, receipt) = send(&app, request("POST", "/checkout", Some("alice"), Some(cart(1)))).await;
    let order_uri = format!("/orders/{}", receipt["orderId"].as_str().unwrap());

    let (status, _) = send(&app, request("GET", &order_uri, Some("bob"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, request("GET", &order_uri, Some("root"), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let (app, _system) = setup().await;
    let (_, receipt) = send(&app, request("POST", "/checkout", Some("alice"), Some(cart(3)))).await;
    let status_uri = format!("/admin/orders/{}/status", receipt["orderId"].as_str().unwrap());
    let cancel = json!({"status": "Cancelled"});

    let (status, _) = send(&app, request("PUT", &status_uri, Some("alice"), Some(cancel.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Claim-based admin: bob has no admin profile, only the trusted claim.
    let mut claimed = request("PUT", &status_uri, Some("bob"), Some(cancel.clone()));
    claimed.headers_mut().insert(ROLE_HEADER, "admin".parse().unwrap());
    let (status, body) = send(&app, claimed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from"], "Pending Payment");
    assert_eq!(body["to"], "Cancelled");

    let (_, product) = send(&app, request("GET", "/products/1", None, None)).await;
    assert_eq!(product["stock"], 10);

    let (status, body) = send(&app, request("PUT", &status_uri, Some("root"), Some(json!({"status": "Shipped"})))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Cancelled"));
}

#[tokio::test]
async fn role_promotion_and_catalog_edits() {
    let (app, _system) = setup().await;

    let promote = json!({"role": "admin"});
    let (status, _) = send(&app, request("POST", "/admin/users/bob/role", Some("alice"), Some(promote.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, request("POST", "/admin/users/bob/role", Some("root"), Some(promote.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous"], "customer");
    assert_eq!(body["role"], "admin");

    let (status, _) = send(&app, request("POST", "/admin/users/ghost/role", Some("root"), Some(promote))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // bob's stale customer claim is overridden by his profile record.
    let mut stale_claim = request("PATCH", "/admin/products/1", Some("bob"), Some(json!({"stock": 25})));
    stale_claim.headers_mut().insert(ROLE_HEADER, "customer".parse().unwrap());
    let (status, product) = send(&app, stale_claim).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"], 25);

    let new_product = json!({"name": "Smart Watch", "price": "149.99", "stock": 5});
    let (status, body) = send(&app, request("POST", "/admin/products", Some("bob"), Some(new_product))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "product_1");

    let (_, catalog) = send(&app, request("GET", "/products", None, None)).await;
    assert_eq!(catalog.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn profile_registration() {
    let (app, _system) = setup().await;
    let profile = json!({"displayName": "Carol", "email": "carol@example.com"});

    let (status, body) = send(&app, request("POST", "/users/me", Some("carol"), Some(profile.clone()))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "carol");
    assert_eq!(body["role"], "customer");

    let (status, _) = send(&app, request("POST", "/users/me", Some("carol"), Some(profile))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, request("PATCH", "/users/me", Some("carol"), Some(json!({"displayName": "Carol W."})))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayName"], "Carol W.");

    let (status, _) = send(&app, request("GET", "/users/me", Some("dave"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
