//! Order orchestration: checkout, payment reconciliation and the reservation
//! lifecycle that ties the inventory ledger to the order store.

mod admin;
mod checkout;
mod reconcile;
mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, instrument, warn};

use crate::clients::{OrderClient, ProductClient};
use crate::domain::{GatewayCorrelation, LineItem, Order, ReservationState};
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{GatewayError, PaymentGateway, RetryPolicy};

pub use checkout::{CheckoutReceipt, CheckoutRequest, PaymentInitiation};
pub use sweeper::spawn_sweeper;

#[cfg(test)]
pub use checkout::CartLine;
#[cfg(test)]
pub use reconcile::ReconcileOutcome;

/// Default bound on one gateway initiation call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Coordinates the ledger, the order store and the payment gateway.
///
/// Holds no state of its own; every consistency guarantee comes from the
/// atomic actions of the collections it drives. Stock is held in the ledger
/// under the order's id, so releasing it twice, or releasing a reservation
/// that never happened, returns nothing.
#[derive(Clone)]
pub struct OrderOrchestrator {
    products: ProductClient,
    orders: OrderClient,
    gateway: Arc<dyn PaymentGateway>,
    gateway_timeout: Duration,
    retry: RetryPolicy,
}

impl OrderOrchestrator {
    pub fn new(products: ProductClient, orders: OrderClient, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            products,
            orders,
            gateway,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    #[cfg(test)]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn get_order(&self, order_id: &str) -> ServiceResult<Order> {
        self.orders
            .get_order(order_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::order_not_found(order_id))
    }

    pub async fn orders_for_user(&self, user_id: &str) -> ServiceResult<Vec<Order>> {
        Ok(self.orders.find_by_user(user_id.to_string()).await?)
    }

    /// One gateway round trip, bounded by the gateway timeout.
    async fn call_gateway(&self, phone: &str, amount: u64, order_id: &str) -> Result<GatewayCorrelation, GatewayError> {
        match tokio::time::timeout(self.gateway_timeout, self.gateway.initiate(phone, amount, order_id)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    /// End of a payment lease long enough for `attempts` gateway calls and the
    /// backoff between them.
    fn payment_lease_until(&self, attempts: u32) -> DateTime<Utc> {
        let span = self
            .gateway_timeout
            .saturating_add(self.retry.max_backoff)
            .saturating_mul(attempts.max(1));
        TimeDelta::from_std(span)
            .ok()
            .and_then(|span| Utc::now().checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns the order's held units to the ledger and marks its reservation
    /// released. Returns the number of units restocked.
    ///
    /// If any line fails the reservation stays open and the error is returned;
    /// the sweep picks the order up again.
    #[instrument(skip(self))]
    pub(crate) async fn release_order_stock(&self, order_id: &str) -> ServiceResult<u32> {
        let order = self.get_order(order_id).await?;
        if !order.reservation.is_releasable() {
            return Ok(0);
        }
        let units = self.release_holds(order_id, &order.items).await?;
        self.orders.release_reservation(order_id.to_string()).await?;
        info!(order_id, units, "Reservation released");
        Ok(units)
    }

    /// Drops the ledger holds of an order whose goods have shipped.
    async fn commit_order_stock(&self, order_id: &str) {
        let order = match self.get_order(order_id).await {
            Ok(order) if order.reservation == ReservationState::Fulfilled => order,
            Ok(_) => return,
            Err(e) => {
                warn!(order_id, error = %e, "Could not load shipped order");
                return;
            }
        };
        for line in &order.items {
            if let Err(e) = self.products.commit(line.product_id.clone(), order.id.clone()).await {
                warn!(order_id, product_id = %line.product_id, error = %e, "Shipped units still held in the ledger");
            }
        }
    }

    /// Releases whatever `order_id` holds for each line. Every line is tried;
    /// a line that fails is logged and the first failure returned.
    async fn release_holds(&self, order_id: &str, lines: &[LineItem]) -> ServiceResult<u32> {
        let mut units = 0u32;
        let mut failure = None;
        for line in lines {
            match self.products.release(line.product_id.clone(), order_id.to_string()).await {
                Ok(quantity) => units = units.saturating_add(quantity),
                Err(e) => {
                    error!(order_id, product_id = %line.product_id, error = %e, "Reserved stock could not be returned");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(units),
        }
    }
}
