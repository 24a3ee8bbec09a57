use tracing::{info, instrument, warn};

use super::OrderOrchestrator;
use crate::domain::{GatewayCorrelation, OrderStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{gateway_amount, normalize_phone};
use crate::order_actor::PaymentClaim;

impl OrderOrchestrator {
    /// Moves an order to `to` on an administrator's behalf and returns the previous status.
    ///
    /// Without `force` the move must be allowed by the status table; with it
    /// any status may be set. Cancelling returns the order's stock unless its
    /// goods have already shipped. Shipping drops the ledger holds for good.
    /// An order forced out of `Cancelled` does not get its reservation back.
    #[instrument(skip(self))]
    pub async fn update_status(&self, order_id: &str, to: OrderStatus, force: bool) -> ServiceResult<OrderStatus> {
        let previous = if force {
            self.orders.override_status(order_id.to_string(), to).await?
        } else {
            self.orders
                .transition(order_id.to_string(), OrderStatus::sources_of(to), to)
                .await?
        };
        match to {
            OrderStatus::Cancelled => {
                if let Err(e) = self.release_order_stock(order_id).await {
                    warn!(error = %e, "Cancelled order stock left for the sweep");
                }
            }
            OrderStatus::Shipped | OrderStatus::Delivered => self.commit_order_stock(order_id).await,
            _ => {}
        }
        if previous == OrderStatus::Cancelled && to != OrderStatus::Cancelled {
            warn!(%to, "Cancelled order reactivated without a stock reservation");
        }
        Ok(previous)
    }

    /// Re-requests the push payment for an order whose first attempt failed.
    ///
    /// Idempotent per order: when the order already carries gateway ids they
    /// are returned without calling the gateway again. The order's payment
    /// lease admits one initiation at a time; a concurrent caller gets
    /// [`ServiceError::InProgress`].
    #[instrument(skip(self))]
    pub async fn retry_payment(&self, order_id: &str) -> ServiceResult<GatewayCorrelation> {
        let order = self.get_order(order_id).await?;
        if let Some(correlation) = order.correlation() {
            info!(checkout_request_id = %correlation.checkout_request_id, "Payment already initiated");
            return Ok(correlation);
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(ServiceError::Conflict {
                order_id: order.id,
                current: order.status,
                attempted: OrderStatus::PendingPayment,
            });
        }
        if !order.payment_method.requires_push_payment() {
            return Err(ServiceError::Validation(format!(
                "order {order_id} is not paid by push payment"
            )));
        }
        let phone = normalize_phone(&order.shipping.phone)?;
        let amount = gateway_amount(order.total)?;

        let lease_until = self.payment_lease_until(self.retry.max_attempts);
        match self.orders.claim_payment_initiation(order_id.to_string(), lease_until).await? {
            PaymentClaim::Claimed => {}
            PaymentClaim::AlreadyInitiated(correlation) => {
                info!(checkout_request_id = %correlation.checkout_request_id, "Payment initiated concurrently");
                return Ok(correlation);
            }
        }

        let phone = phone.as_str();
        let correlation = match self.retry.run(move || self.call_gateway(phone, amount, order_id)).await {
            Ok(correlation) => correlation,
            Err(e) => {
                warn!(error = %e, "Payment re-initiation failed");
                if let Err(record_err) = self.orders.record_payment_error(order_id.to_string(), e.to_string()).await {
                    warn!(error = %record_err, "Could not record payment error");
                }
                return Err(e.into());
            }
        };
        self.orders.record_correlation(order_id.to_string(), correlation.clone()).await?;
        info!(checkout_request_id = %correlation.checkout_request_id, "Payment re-initiated");
        Ok(correlation)
    }
}
