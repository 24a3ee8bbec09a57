//! Customer-facing checkout and order endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::ApiResult;
use super::AppState;
use crate::domain::{GatewayCorrelation, Order, OrderStatus, Role};
use crate::error::{ServiceError, ServiceResult};
use crate::orchestrator::{CheckoutReceipt, CheckoutRequest, PaymentInitiation};
use crate::roles::Identity;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub total: Decimal,
    /// `not_required`, `initiated`, `failed` or `unrecorded`.
    pub payment: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<String>,
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        let (payment, checkout_request_id, payment_error) = match receipt.payment {
            PaymentInitiation::NotRequired => ("not_required", None, None),
            PaymentInitiation::Initiated(correlation) => ("initiated", Some(correlation.checkout_request_id), None),
            PaymentInitiation::Failed(e) => ("failed", None, Some(e.to_string())),
            PaymentInitiation::Unrecorded { correlation, error } => {
                ("unrecorded", Some(correlation.checkout_request_id), Some(error.to_string()))
            }
        };
        Self {
            order_id: receipt.order_id,
            status: receipt.status,
            total: receipt.total,
            payment,
            checkout_request_id,
            payment_error,
        }
    }
}

/// POST /checkout
pub async fn checkout(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let Json(request) = payload?;
    let receipt = state.orchestrator.checkout(&identity.uid, request).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// GET /orders
pub async fn list_my_orders(State(state): State<AppState>, identity: Identity) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.orchestrator.orders_for_user(&identity.uid).await?))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    Ok(Json(visible_order(&state, &identity, &id).await?))
}

/// POST /orders/{id}/payment/retry
pub async fn retry_payment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> ApiResult<Json<GatewayCorrelation>> {
    let order = visible_order(&state, &identity, &id).await?;
    if order.user_id != identity.uid {
        return Err(ServiceError::PermissionDenied("Only the order's owner can retry its payment.".to_string()).into());
    }
    Ok(Json(state.orchestrator.retry_payment(&id).await?))
}

/// The order if the caller owns it or is an admin; other callers get `NotFound`.
async fn visible_order(state: &AppState, identity: &Identity, id: &str) -> ServiceResult<Order> {
    let order = state.orchestrator.get_order(id).await?;
    if order.user_id == identity.uid || state.access.has_role(identity, Role::Admin).await? {
        Ok(order)
    } else {
        Err(ServiceError::order_not_found(id))
    }
}
