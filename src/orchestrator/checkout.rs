use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

use super::OrderOrchestrator;
use crate::domain::{order_total, GatewayCorrelation, LineItem, OrderCreate, OrderStatus, PaymentMethod, ShippingInfo};
use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{gateway_amount, normalize_phone, GatewayError};
use crate::order_actor::OrderError;

/// One cart line as submitted by the client. Any price the client sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
}

/// What happened to the push payment requested during checkout.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentInitiation {
    /// The payment method does not use push payments.
    NotRequired,
    Initiated(GatewayCorrelation),
    /// The gateway call failed; the order stays `Pending Payment`.
    Failed(GatewayError),
    /// The gateway accepted the request but its ids could not be stored on the
    /// order, so the result callback will not match it.
    Unrecorded {
        correlation: GatewayCorrelation,
        error: ServiceError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutReceipt {
    pub order_id: String,
    pub status: OrderStatus,
    pub total: Decimal,
    pub payment: PaymentInitiation,
}

/// Rejects malformed carts and folds repeated products into one line.
pub(crate) fn validate_cart(request: &CheckoutRequest) -> ServiceResult<Vec<CartLine>> {
    if request.items.is_empty() {
        return Err(ServiceError::Validation("cart is empty".to_string()));
    }
    let shipping = &request.shipping;
    for (field, value) in [("name", &shipping.name), ("address", &shipping.address), ("phone", &shipping.phone)] {
        if value.trim().is_empty() {
            return Err(ServiceError::Validation(format!("shipping {field} is required")));
        }
    }

    let mut lines: Vec<CartLine> = Vec::with_capacity(request.items.len());
    for item in &request.items {
        if item.product_id.trim().is_empty() {
            return Err(ServiceError::Validation("productId is required".to_string()));
        }
        if item.quantity == 0 {
            return Err(ServiceError::Validation(format!(
                "quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        match lines.iter_mut().find(|line| line.product_id == item.product_id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(item.quantity).ok_or_else(|| {
                    ServiceError::Validation(format!("quantity for product {} is too large", item.product_id))
                })?;
            }
            None => lines.push(item.clone()),
        }
    }
    Ok(lines)
}

impl OrderOrchestrator {
    /// Turns a cart into an order.
    ///
    /// The order id is allocated up front and every line's stock is held in
    /// the ledger under it. If a reservation or the order write fails, the
    /// holds for that id are released before the error is returned; an order
    /// write whose outcome is unknown is also cancelled if it landed. A failed
    /// payment initiation does not fail the checkout: the order exists and is
    /// reported with [`PaymentInitiation::Failed`].
    #[instrument(
        skip(self, request),
        fields(user_id = %user_id, lines = request.items.len(), order_id = tracing::field::Empty)
    )]
    pub async fn checkout(&self, user_id: &str, request: CheckoutRequest) -> ServiceResult<CheckoutReceipt> {
        let lines = validate_cart(&request)?;
        let phone = if request.payment_method.requires_push_payment() {
            Some(normalize_phone(&request.shipping.phone)?)
        } else {
            None
        };

        let items = self.price_lines(&lines).await?;
        let total = order_total(&items).ok_or_else(|| ServiceError::Validation("order total is too large".to_string()))?;
        let amount = match phone {
            Some(_) => Some(gateway_amount(total)?),
            None => None,
        };

        let order_id = Uuid::new_v4().to_string();
        Span::current().record("order_id", order_id.as_str());
        self.reserve_all(&order_id, &items).await?;

        let status = request.payment_method.initial_status();
        let order = OrderCreate {
            user_id: user_id.to_string(),
            items: items.clone(),
            shipping: request.shipping,
            payment_method: request.payment_method,
            payment_lease_until: phone.as_ref().map(|_| self.payment_lease_until(1)),
        };
        if let Err(e) = self.orders.insert_order(order_id.clone(), order).await {
            warn!(error = %e, "Order write failed, releasing reservations");
            self.abandon_checkout(&order_id, &items, status, &e).await;
            return Err(e.into());
        }
        info!(%total, %status, "Order created");

        let payment = match (phone, amount) {
            (Some(phone), Some(amount)) => self.initiate_payment(&order_id, &phone, amount).await,
            _ => PaymentInitiation::NotRequired,
        };

        Ok(CheckoutReceipt { order_id, status, total, payment })
    }

    /// Snapshots name and price from the catalog for every line.
    async fn price_lines(&self, lines: &[CartLine]) -> ServiceResult<Vec<LineItem>> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .products
                .get_product(line.product_id.clone())
                .await?
                .ok_or_else(|| ServiceError::product_not_found(&line.product_id))?;
            // Early answer only; the reservation re-checks atomically.
            if line.quantity > product.stock {
                return Err(ServiceError::InsufficientStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available: product.stock,
                });
            }
            items.push(LineItem {
                product_id: product.id,
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }
        Ok(items)
    }

    async fn reserve_all(&self, order_id: &str, items: &[LineItem]) -> ServiceResult<()> {
        for item in items {
            if let Err(e) = self
                .products
                .reserve(item.product_id.clone(), order_id.to_string(), item.quantity)
                .await
            {
                warn!(product_id = %item.product_id, error = %e, "Reservation failed, rolling back checkout");
                // A timed-out reservation may still have been applied, so every line is released.
                if let Err(release_err) = self.release_holds(order_id, items).await {
                    warn!(error = %release_err, "Rollback incomplete, holds left for the sweep");
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Undoes a checkout whose order write failed.
    ///
    /// A storage error does not say whether the write was applied. The order
    /// store handles requests in arrival order, so a cancellation sent now
    /// lands after the write if the write lands at all.
    async fn abandon_checkout(&self, order_id: &str, items: &[LineItem], status: OrderStatus, cause: &OrderError) {
        if let Err(e) = self.release_holds(order_id, items).await {
            warn!(error = %e, "Rollback incomplete, holds left for the sweep");
        }
        if !matches!(cause, OrderError::Storage(_)) {
            return;
        }
        match self
            .orders
            .transition(order_id.to_string(), vec![status], OrderStatus::Cancelled)
            .await
        {
            Ok(_) => {
                if let Err(e) = self.release_order_stock(order_id).await {
                    warn!(error = %e, "Abandoned order left for the sweep");
                }
            }
            Err(OrderError::NotFound(_)) => {}
            Err(e) => error!(error = %e, %status, "Abandoned order may exist without stock, left for the sweep"),
        }
    }

    /// Requests the push payment and stores the gateway's ids on the order.
    #[instrument(skip(self, phone))]
    async fn initiate_payment(&self, order_id: &str, phone: &str, amount: u64) -> PaymentInitiation {
        match self.call_gateway(phone, amount, order_id).await {
            Ok(correlation) => {
                match self.orders.record_correlation(order_id.to_string(), correlation.clone()).await {
                    Ok(()) => {
                        info!(checkout_request_id = %correlation.checkout_request_id, "Payment initiated");
                        PaymentInitiation::Initiated(correlation)
                    }
                    Err(e) => {
                        error!(
                            merchant_request_id = %correlation.merchant_request_id,
                            checkout_request_id = %correlation.checkout_request_id,
                            error = %e,
                            "Payment initiated but correlation ids were not stored"
                        );
                        PaymentInitiation::Unrecorded { correlation, error: e.into() }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Payment initiation failed, order left pending payment");
                if let Err(record_err) = self.orders.record_payment_error(order_id.to_string(), e.to_string()).await {
                    warn!(error = %record_err, "Could not record payment error");
                }
                PaymentInitiation::Failed(e)
            }
        }
    }
}
