use thiserror::Error;

use crate::actor_framework::StorageError;
use crate::domain::OrderStatus;
use crate::gateway::GatewayError;
use crate::order_actor::OrderError;
use crate::product_actor::ProductError;
use crate::user_actor::UserError;

/// Error taxonomy shared by the orchestrator and the HTTP layer.
///
/// Validation and not-found errors are surfaced to callers verbatim; storage
/// errors are retryable.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("Order {order_id} is {current}, cannot move to {attempted}")]
    Conflict {
        order_id: String,
        current: OrderStatus,
        attempted: OrderStatus,
    },
    /// Another request is already working on the same order.
    #[error("{0}")]
    InProgress(String),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn product_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "Product", id: id.into() }
    }

    pub fn order_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "Order", id: id.into() }
    }

    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "User", id: id.into() }
    }
}

impl From<ProductError> for ServiceError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::NotFound(id) => Self::product_not_found(id),
            ProductError::InsufficientStock { product_id, requested, available } => {
                Self::InsufficientStock { product_id, requested, available }
            }
            ProductError::Storage(e) => Self::Storage(e),
            other @ (ProductError::AlreadyExists(_)
            | ProductError::InvalidQuantity(_)
            | ProductError::InvalidPrice(_)
            | ProductError::ValidationError(_)) => Self::Validation(other.to_string()),
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => Self::order_not_found(id),
            OrderError::Conflict { order_id, current, attempted } => Self::Conflict { order_id, current, attempted },
            OrderError::Storage(e) => Self::Storage(e),
            busy @ OrderError::PaymentInFlight(_) => Self::InProgress(busy.to_string()),
            other @ (OrderError::AlreadyExists(_)
            | OrderError::CorrelationMismatch { .. }
            | OrderError::ValidationError(_)) => Self::Validation(other.to_string()),
        }
    }
}

impl From<UserError> for ServiceError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => Self::user_not_found(id),
            UserError::Storage(e) => Self::Storage(e),
            other @ (UserError::AlreadyExists(_) | UserError::ValidationError(_)) => Self::Validation(other.to_string()),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
