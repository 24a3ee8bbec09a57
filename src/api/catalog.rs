//! Catalog reads and admin product edits.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiResult;
use super::AppState;
use crate::domain::{Product, ProductCreate, ProductPatch};
use crate::error::ServiceError;
use crate::roles::Identity;

/// GET /products
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.products.list_products().await?))
}

/// GET /products/{id}
pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    let product = state
        .products
        .get_product(id.clone())
        .await?
        .ok_or_else(|| ServiceError::product_not_found(id))?;
    Ok(Json(product))
}

/// POST /admin/products
pub async fn create_product(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<ProductCreate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.access.require_admin(&identity).await?;
    let Json(product) = payload?;
    let id = state.products.create_product(product).await?;
    info!(admin = %identity.uid, product_id = %id, "Product created");
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// PATCH /admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> ApiResult<Json<Product>> {
    state.access.require_admin(&identity).await?;
    let Json(patch) = payload?;
    let product = state.products.update_product(id, patch).await?;
    info!(admin = %identity.uid, product_id = %product.id, "Product updated");
    Ok(Json(product))
}
