use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// `Paid`, `Delivered` and `Cancelled` accept no further payment results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "Pending Payment")]
    PendingPayment,
    Placed,
    Paid,
    #[serde(rename = "Payment Failed")]
    PaymentFailed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 7] = [
        Self::PendingPayment,
        Self::Placed,
        Self::Paid,
        Self::PaymentFailed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Statuses from which the table allows a move to `to`.
    pub fn sources_of(to: Self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|from| from.can_transition_to(to)).collect()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "Pending Payment",
            Self::Placed => "Placed",
            Self::Paid => "Paid",
            Self::PaymentFailed => "Payment Failed",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        use OrderStatus::*;
        match self {
            PendingPayment => matches!(to, Paid | PaymentFailed | Cancelled),
            Placed | Paid => matches!(to, Shipped | Cancelled),
            PaymentFailed => to == Cancelled,
            Shipped => matches!(to, Delivered | Cancelled),
            Delivered | Cancelled => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer chose to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    /// M-Pesa STK push.
    Mpesa,
    CashOnDelivery,
    Other(String),
}

impl PaymentMethod {
    pub fn requires_push_payment(&self) -> bool {
        matches!(self, Self::Mpesa)
    }

    pub fn initial_status(&self) -> OrderStatus {
        if self.requires_push_payment() {
            OrderStatus::PendingPayment
        } else {
            OrderStatus::Placed
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "MPESA" => Self::Mpesa,
            "COD" => Self::CashOnDelivery,
            _ => Self::Other(value),
        }
    }
}

impl From<PaymentMethod> for String {
    fn from(value: PaymentMethod) -> Self {
        match value {
            PaymentMethod::Mpesa => "MPESA".to_string(),
            PaymentMethod::CashOnDelivery => "COD".to_string(),
            PaymentMethod::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
}

/// One priced line of an order. Name and price are snapshots taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    /// Price times quantity; `None` if it does not fit a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// State of the stock held by an order.
///
/// `Held` and `Committed` units are still on the shelf and go back to stock
/// when the reservation is released. `Fulfilled` units have shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationState {
    Held,
    /// Payment captured.
    Committed,
    Fulfilled,
    Released,
}

impl ReservationState {
    pub const fn is_releasable(self) -> bool {
        matches!(self, Self::Held | Self::Committed)
    }
}

/// Identifiers returned by the gateway when a push payment is initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCorrelation {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
}

/// Represents a customer order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub reservation: ReservationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpesa_receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<String>,
    /// While set and in the future, a payment initiation owns the order.
    #[serde(skip)]
    pub payment_lease_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn correlation(&self) -> Option<GatewayCorrelation> {
        match (&self.merchant_request_id, &self.checkout_request_id) {
            (Some(merchant), Some(checkout)) => Some(GatewayCorrelation {
                merchant_request_id: merchant.clone(),
                checkout_request_id: checkout.clone(),
            }),
            _ => None,
        }
    }
}

/// Payload for creating a new order. The total is derived from `items`.
#[derive(Debug, Clone)]
pub struct OrderCreate {
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    /// Claims the first payment initiation for the checkout creating the order.
    pub payment_lease_until: Option<DateTime<Utc>>,
}

/// Sum of price times quantity over the lines; `None` on overflow.
pub fn order_total(items: &[LineItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal()?))
}
