use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::actor_framework::{Filter, ResourceClient};
use crate::domain::{GatewayCorrelation, Order, OrderCreate, OrderStatus};
use crate::order_actor::{OrderAction, OrderActionResult, OrderError, PaymentClaim};

/// Client for the order store.
///
/// Status changes go through [`OrderClient::transition`], a compare-and-set on
/// the current status, so stale or duplicate writers are rejected with
/// [`OrderError::Conflict`] instead of overwriting newer state.
#[derive(Clone)]
pub struct OrderClient {
    inner: ResourceClient<Order>,
}

impl_basic_client!(OrderClient, Order, OrderError, get = get_order);

fn unexpected(result: OrderActionResult) -> OrderError {
    OrderError::ValidationError(format!("Unexpected action result: {result:?}"))
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

impl OrderClient {
    /// Stores a new order under an id the caller allocated, so a write whose
    /// outcome is unknown can be looked up again.
    #[instrument(skip(self, order), fields(user_id = %order.user_id, lines = order.items.len()))]
    pub async fn insert_order(&self, id: String, order: OrderCreate) -> Result<String, OrderError> {
        debug!("Sending request");
        self.inner.insert(id, order).await
    }

    /// Looks an order up by the gateway's `CheckoutRequestID`.
    #[instrument(skip(self))]
    pub async fn find_by_correlation_id(&self, checkout_request_id: String) -> Result<Option<Order>, OrderError> {
        debug!("Sending request");
        let matches = self
            .inner
            .query(Filter::new(move |order: &Order| {
                order.checkout_request_id.as_deref() == Some(checkout_request_id.as_str())
            }))
            .await?;
        Ok(matches.into_iter().next())
    }

    #[instrument(skip(self))]
    pub async fn find_by_user(&self, user_id: String) -> Result<Vec<Order>, OrderError> {
        debug!("Sending request");
        let orders = self.inner.query(Filter::new(move |order: &Order| order.user_id == user_id)).await?;
        Ok(newest_first(orders))
    }

    /// Orders still awaiting payment that were created before `cutoff`.
    #[instrument(skip(self))]
    pub async fn find_pending_payment_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderError> {
        debug!("Sending request");
        self.inner
            .query(Filter::new(move |order: &Order| {
                order.status == OrderStatus::PendingPayment && order.created_at < cutoff
            }))
            .await
    }

    /// Failed or cancelled orders whose stock has not gone back to the ledger yet.
    #[instrument(skip(self))]
    pub async fn find_unreleased_closed(&self) -> Result<Vec<Order>, OrderError> {
        debug!("Sending request");
        self.inner
            .query(Filter::new(|order: &Order| {
                matches!(order.status, OrderStatus::PaymentFailed | OrderStatus::Cancelled)
                    && order.reservation.is_releasable()
            }))
            .await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        debug!("Sending request");
        Ok(newest_first(self.inner.query(Filter::all()).await?))
    }

    /// Moves the order to `to` only if its current status is one of `from`.
    #[instrument(skip(self))]
    pub async fn transition(&self, id: String, from: Vec<OrderStatus>, to: OrderStatus) -> Result<OrderStatus, OrderError> {
        debug!("Sending request");
        match self.inner.perform_action(id.clone(), OrderAction::Transition { from, to }).await? {
            OrderActionResult::Transitioned { from, to } => {
                info!(order_id = %id, %from, %to, "Order status changed");
                Ok(from)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Administrative override; returns the previous status.
    #[instrument(skip(self))]
    pub async fn override_status(&self, id: String, to: OrderStatus) -> Result<OrderStatus, OrderError> {
        debug!("Sending request");
        match self.inner.perform_action(id.clone(), OrderAction::Override(to)).await? {
            OrderActionResult::Transitioned { from, to } => {
                info!(order_id = %id, %from, %to, "Order status overridden");
                Ok(from)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Takes the order's payment lease until `until`.
    #[instrument(skip(self))]
    pub async fn claim_payment_initiation(&self, id: String, until: DateTime<Utc>) -> Result<PaymentClaim, OrderError> {
        debug!("Sending request");
        match self.inner.perform_action(id, OrderAction::ClaimPaymentInitiation { until }).await? {
            OrderActionResult::PaymentClaim(claim) => Ok(claim),
            other => Err(unexpected(other)),
        }
    }

    #[instrument(skip(self))]
    pub async fn record_correlation(&self, id: String, correlation: GatewayCorrelation) -> Result<(), OrderError> {
        debug!("Sending request");
        self.record(id, OrderAction::RecordCorrelation(correlation)).await
    }

    #[instrument(skip(self))]
    pub async fn record_payment_error(&self, id: String, message: String) -> Result<(), OrderError> {
        debug!("Sending request");
        self.record(id, OrderAction::RecordPaymentError(message)).await
    }

    #[instrument(skip(self))]
    pub async fn record_receipt(&self, id: String, receipt: String) -> Result<(), OrderError> {
        debug!("Sending request");
        self.record(id, OrderAction::RecordReceipt(receipt)).await
    }

    /// Marks the order's reservation released. Call only after its units are
    /// back in the ledger.
    #[instrument(skip(self))]
    pub async fn release_reservation(&self, id: String) -> Result<(), OrderError> {
        debug!("Sending request");
        self.record(id, OrderAction::ReleaseReservation).await
    }

    async fn record(&self, id: String, action: OrderAction) -> Result<(), OrderError> {
        match self.inner.perform_action(id, action).await? {
            OrderActionResult::Recorded => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}
