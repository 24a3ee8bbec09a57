use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use super::OrderOrchestrator;
use crate::domain::OrderStatus;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Orders cancelled and restocked by this pass.
    pub cancelled: Vec<String>,
    /// Stale orders that changed status before the sweep reached them.
    pub skipped: usize,
    /// Failed or cancelled orders whose earlier stock release is now complete.
    pub released: Vec<String>,
    /// Units returned from holds whose order was never stored.
    pub orphaned_units: u32,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.cancelled.is_empty() && self.released.is_empty() && self.orphaned_units == 0
    }
}

impl OrderOrchestrator {
    /// One cleanup pass over the reservation arena.
    ///
    /// Cancels orders left in `Pending Payment` since before `cutoff` and
    /// releases their stock, finishes releases that failed earlier on
    /// cancelled or failed orders, and returns holds older than `cutoff` whose
    /// order was never written.
    #[instrument(skip(self))]
    pub async fn sweep_stale_orders(&self, cutoff: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let mut report = SweepReport::default();
        self.cancel_stale(cutoff, &mut report).await?;
        self.finish_releases(&mut report).await?;
        self.release_orphaned_holds(cutoff, &mut report).await?;
        Ok(report)
    }

    async fn cancel_stale(&self, cutoff: DateTime<Utc>, report: &mut SweepReport) -> ServiceResult<()> {
        for order in self.orders.find_pending_payment_before(cutoff).await? {
            match self
                .orders
                .transition(order.id.clone(), vec![OrderStatus::PendingPayment], OrderStatus::Cancelled)
                .await
                .map_err(ServiceError::from)
            {
                Ok(_) => {}
                Err(ServiceError::Conflict { current, .. }) => {
                    debug!(order_id = %order.id, %current, "Order settled before sweep");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Could not cancel stale order");
                    continue;
                }
            }
            if let Err(e) = self.release_order_stock(&order.id).await {
                warn!(order_id = %order.id, error = %e, "Could not release stale order stock");
            }
            report.cancelled.push(order.id);
        }
        Ok(())
    }

    async fn finish_releases(&self, report: &mut SweepReport) -> ServiceResult<()> {
        for order in self.orders.find_unreleased_closed().await? {
            match self.release_order_stock(&order.id).await {
                Ok(_) => report.released.push(order.id),
                Err(e) => warn!(order_id = %order.id, error = %e, "Stock release still failing"),
            }
        }
        Ok(())
    }

    async fn release_orphaned_holds(&self, cutoff: DateTime<Utc>, report: &mut SweepReport) -> ServiceResult<()> {
        for (product_id, order_id) in self.products.find_holds_before(cutoff).await? {
            if self.orders.get_order(order_id.clone()).await?.is_some() {
                continue;
            }
            match self.products.release(product_id.clone(), order_id.clone()).await {
                Ok(units) => {
                    warn!(%product_id, %order_id, units, "Released stock held for an order that was never stored");
                    report.orphaned_units = report.orphaned_units.saturating_add(units);
                }
                Err(e) => warn!(%product_id, %order_id, error = %e, "Could not release orphaned hold"),
            }
        }
        Ok(())
    }
}

/// Runs [`OrderOrchestrator::sweep_stale_orders`] every `interval` until `shutdown` fires.
pub fn spawn_sweeper(
    orchestrator: OrderOrchestrator,
    interval: Duration,
    ttl: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let task = async move {
        info!(?interval, ?ttl, "Stale order sweeper starting");
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
                        continue;
                    };
                    match orchestrator.sweep_stale_orders(cutoff).await {
                        Ok(report) if !report.is_empty() => {
                            info!(
                                cancelled = report.cancelled.len(),
                                skipped = report.skipped,
                                released = report.released.len(),
                                orphaned_units = report.orphaned_units,
                                "Reservations cleaned up"
                            );
                        }
                        Ok(_) => debug!("Nothing to clean up"),
                        Err(e) => warn!(error = %e, "Stale order sweep failed"),
                    }
                }
            }
        }
        info!("Stale order sweeper stopped");
    };
    tokio::spawn(task.instrument(info_span!("stale_order_sweeper")))
}
