use chrono::{DateTime, Utc};

use crate::domain::{GatewayCorrelation, OrderStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    /// Compare-and-set on status: applied only if the current status is one of `from`.
    Transition { from: Vec<OrderStatus>, to: OrderStatus },
    /// Administrative override, bypasses the lifecycle table.
    Override(OrderStatus),
    /// Takes the payment lease until `until` so only one caller requests a push payment.
    ClaimPaymentInitiation { until: DateTime<Utc> },
    /// Stores the gateway identifiers used to match the payment callback.
    RecordCorrelation(GatewayCorrelation),
    /// Keeps the last payment initiation failure for operators.
    RecordPaymentError(String),
    RecordReceipt(String),
    /// Marks the reservation released once its units are back in the ledger.
    ReleaseReservation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentClaim {
    Claimed,
    /// The order already carries gateway ids; nothing to initiate.
    AlreadyInitiated(GatewayCorrelation),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderActionResult {
    Transitioned { from: OrderStatus, to: OrderStatus },
    PaymentClaim(PaymentClaim),
    Recorded,
}
