//! Payment gateway webhook.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, info};

use super::error::ApiError;
use super::AppState;
use crate::gateway::parse_callback;

/// POST /payments/mpesa/callback
///
/// Acknowledges every structurally valid callback, including ones that match
/// no order or fail to apply: the gateway retries anything but a 2xx.
pub async fn mpesa_callback(State(state): State<AppState>, payload: Result<Json<Value>, JsonRejection>) -> Response {
    let parsed = payload
        .map_err(ApiError::from)
        .and_then(|Json(body)| parse_callback(body).map_err(ApiError::from));
    let callback = match parsed {
        Ok(callback) => callback,
        Err(e) => return e.into_response(),
    };

    match state.orchestrator.reconcile_payment(&callback).await {
        Ok(outcome) => info!(?outcome, "Payment callback processed"),
        Err(e) => error!(
            checkout_request_id = %callback.checkout_request_id,
            error = %e,
            "Payment callback could not be applied"
        ),
    }
    (StatusCode::OK, Json(json!({ "result": "ok" }))).into_response()
}
