//! Back-office endpoints. Every handler requires the admin role.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiResult;
use super::AppState;
use crate::domain::{Order, OrderStatus, Role};
use crate::roles::Identity;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    /// Skip the transition table.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    pub order_id: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RoleChanged {
    pub uid: String,
    pub previous: Role,
    pub role: Role,
}

/// GET /admin/orders
pub async fn list_orders(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Order>>> {
    state.access.require_admin(&identity).await?;
    Ok(Json(state.orders.list_orders().await?))
}

/// PUT /admin/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<StatusChanged>> {
    state.access.require_admin(&identity).await?;
    let Json(update) = payload?;
    let from = state.orchestrator.update_status(&id, update.status, update.force).await?;
    Ok(Json(StatusChanged { order_id: id, from, to: update.status }))
}

/// POST /admin/users/{uid}/role
pub async fn set_user_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(uid): Path<String>,
    payload: Result<Json<RoleUpdate>, JsonRejection>,
) -> ApiResult<Json<RoleChanged>> {
    let Json(update) = payload?;
    let previous = state.access.promote(&identity, &uid, update.role).await?;
    Ok(Json(RoleChanged { uid, previous, role: update.role }))
}
