use thiserror::Error;

use crate::actor_framework::StorageError;
use crate::domain::OrderStatus;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),
    #[error("Order already exists: {0}")]
    AlreadyExists(String),
    #[error("Order {order_id} is {current}, cannot move to {attempted}")]
    Conflict {
        order_id: String,
        current: OrderStatus,
        attempted: OrderStatus,
    },
    #[error("Payment for order {0} is already being initiated")]
    PaymentInFlight(String),
    #[error("Order {order_id} already correlated with checkout request {existing}")]
    CorrelationMismatch { order_id: String, existing: String },
    #[error("Order validation error: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
