//! Push-payment gateway integration (M-Pesa Daraja STK push).

pub mod callback;
pub mod daraja;
pub mod phone;
pub mod retry;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::GatewayCorrelation;
use crate::error::ServiceError;

pub use callback::{parse_callback, StkCallback};
pub use daraja::{DarajaConfig, DarajaGateway};
pub use phone::normalize_phone;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Gateway authentication failed: {0}")]
    AuthFailure(String),
    #[error("Gateway request timed out")]
    Timeout,
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Gateway unreachable: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Whether a later identical attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Rejected(format!("malformed response: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// A push-payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Prompts `phone` to authorize `amount` (whole currency units) for `order_reference`.
    async fn initiate(&self, phone: &str, amount: u64, order_reference: &str) -> Result<GatewayCorrelation, GatewayError>;
}

/// Converts an order total into the amount the gateway charges.
///
/// The gateway only accepts whole units, so totals are rounded up: the
/// customer is never undercharged by a fraction of a unit.
pub fn gateway_amount(total: Decimal) -> Result<u64, ServiceError> {
    let amount = total.ceil().to_u64().unwrap_or(0);
    if amount == 0 {
        return Err(ServiceError::Validation(format!(
            "order total {total} cannot be charged by push payment"
        )));
    }
    Ok(amount)
}
