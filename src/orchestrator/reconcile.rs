use tracing::{info, instrument, warn};

use super::OrderOrchestrator;
use crate::domain::OrderStatus;
use crate::error::ServiceResult;
use crate::gateway::StkCallback;
use crate::order_actor::OrderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The callback moved the order to `status`.
    Applied { order_id: String, status: OrderStatus },
    /// The order had already left `Pending Payment`; nothing changed.
    Ignored { order_id: String, current: OrderStatus },
    /// No order carries the callback's `CheckoutRequestID`.
    Unmatched,
}

impl OrderOrchestrator {
    /// Applies an asynchronous payment result to its order.
    ///
    /// The status change is a compare-and-set from `Pending Payment`, so
    /// duplicate and out-of-order deliveries leave the order untouched.
    #[instrument(
        skip(self, callback),
        fields(checkout_request_id = %callback.checkout_request_id, result_code = callback.result_code)
    )]
    pub async fn reconcile_payment(&self, callback: &StkCallback) -> ServiceResult<ReconcileOutcome> {
        let Some(order) = self.orders.find_by_correlation_id(callback.checkout_request_id.clone()).await? else {
            warn!(
                merchant_request_id = ?callback.merchant_request_id,
                "No order matches payment callback"
            );
            return Ok(ReconcileOutcome::Unmatched);
        };

        let to = if callback.is_success() { OrderStatus::Paid } else { OrderStatus::PaymentFailed };
        match self.orders.transition(order.id.clone(), vec![OrderStatus::PendingPayment], to).await {
            Ok(_) => {}
            Err(OrderError::Conflict { current, .. }) => {
                if callback.is_success() && current == OrderStatus::Cancelled {
                    warn!(order_id = %order.id, "Payment received for a cancelled order, refund required");
                } else {
                    info!(order_id = %order.id, %current, "Stale payment callback ignored");
                }
                return Ok(ReconcileOutcome::Ignored { order_id: order.id, current });
            }
            Err(e) => return Err(e.into()),
        }

        if callback.is_success() {
            if let Some(receipt) = callback.receipt_number() {
                if let Err(e) = self.orders.record_receipt(order.id.clone(), receipt).await {
                    warn!(order_id = %order.id, error = %e, "Could not record payment receipt");
                }
            }
        } else {
            let reason = callback
                .result_desc
                .clone()
                .unwrap_or_else(|| format!("result code {}", callback.result_code));
            if let Err(e) = self.orders.record_payment_error(order.id.clone(), reason).await {
                warn!(order_id = %order.id, error = %e, "Could not record payment failure reason");
            }
            if let Err(e) = self.release_order_stock(&order.id).await {
                warn!(order_id = %order.id, error = %e, "Failed payment stock left for the sweep");
            }
        }

        Ok(ReconcileOutcome::Applied { order_id: order.id, status: to })
    }
}
