//! HTTP surface: storefront, checkout, payment webhook and back office.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod orders;
pub mod payments;
pub mod users;

use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::clients::{OrderClient, ProductClient, UserClient};
use crate::orchestrator::OrderOrchestrator;
use crate::roles::AccessControl;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: OrderOrchestrator,
    pub products: ProductClient,
    pub orders: OrderClient,
    pub users: UserClient,
    pub access: AccessControl,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/checkout", post(orders::checkout))
        .route("/orders", get(orders::list_my_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/payment/retry", post(orders::retry_payment))
        .route("/payments/mpesa/callback", post(payments::mpesa_callback))
        .route("/users/me", post(users::create_profile).get(users::get_profile).patch(users::update_profile))
        .route("/admin/products", post(catalog::create_product))
        .route("/admin/products/{id}", patch(catalog::update_product))
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/orders/{id}/status", put(admin::update_order_status))
        .route("/admin/users/{uid}/role", post(admin::set_user_role))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests;
