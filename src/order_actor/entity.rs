use chrono::Utc;

use super::actions::{OrderAction, OrderActionResult, PaymentClaim};
use super::error::OrderError;
use crate::actor_framework::Entity;
use crate::domain::{order_total, Order, OrderCreate, OrderStatus, ReservationState};

impl Order {
    fn set_status(&mut self, to: OrderStatus) -> OrderActionResult {
        let from = self.status;
        self.status = to;
        match to {
            OrderStatus::Paid if self.reservation == ReservationState::Held => {
                self.reservation = ReservationState::Committed;
            }
            OrderStatus::Shipped | OrderStatus::Delivered if self.reservation.is_releasable() => {
                self.reservation = ReservationState::Fulfilled;
            }
            _ => {}
        }
        self.updated_at = Utc::now();
        OrderActionResult::Transitioned { from, to }
    }
}

impl Entity for Order {
    const COLLECTION: &'static str = "orders";

    type Id = String;
    type CreateParams = OrderCreate;
    type Patch = ();
    type Action = OrderAction;
    type ActionResult = OrderActionResult;
    type Error = OrderError;

    /// Creates a new Order with its stock reservation held.
    ///
    /// The total is always recomputed from the line items; the initial status
    /// depends on whether the payment method needs a push payment.
    fn from_create_params(id: String, params: OrderCreate) -> Result<Self, OrderError> {
        if params.items.is_empty() {
            return Err(OrderError::ValidationError("order has no items".to_string()));
        }
        if params.items.iter().any(|item| item.quantity == 0) {
            return Err(OrderError::ValidationError("line quantity must be at least 1".to_string()));
        }
        let total = order_total(&params.items)
            .ok_or_else(|| OrderError::ValidationError("order total is too large".to_string()))?;
        let now = Utc::now();
        Ok(Self {
            id,
            user_id: params.user_id,
            total,
            items: params.items,
            shipping: params.shipping,
            status: params.payment_method.initial_status(),
            payment_method: params.payment_method,
            reservation: ReservationState::Held,
            merchant_request_id: None,
            checkout_request_id: None,
            mpesa_receipt: None,
            payment_error: None,
            payment_lease_until: params.payment_lease_until,
            created_at: now,
            updated_at: now,
        })
    }

    fn not_found(id: &String) -> OrderError {
        OrderError::NotFound(id.clone())
    }

    fn already_exists(id: &String) -> OrderError {
        OrderError::AlreadyExists(id.clone())
    }

    /// Orders change only through actions.
    fn on_update(&mut self, _patch: ()) -> Result<(), OrderError> {
        Ok(())
    }

    fn handle_action(&mut self, action: OrderAction) -> Result<OrderActionResult, OrderError> {
        match action {
            OrderAction::Transition { from, to } => {
                if !from.contains(&self.status) || !self.status.can_transition_to(to) {
                    return Err(OrderError::Conflict {
                        order_id: self.id.clone(),
                        current: self.status,
                        attempted: to,
                    });
                }
                Ok(self.set_status(to))
            }
            OrderAction::Override(to) => Ok(self.set_status(to)),
            OrderAction::ClaimPaymentInitiation { until } => {
                if let Some(correlation) = self.correlation() {
                    return Ok(OrderActionResult::PaymentClaim(PaymentClaim::AlreadyInitiated(correlation)));
                }
                if self.status != OrderStatus::PendingPayment {
                    return Err(OrderError::Conflict {
                        order_id: self.id.clone(),
                        current: self.status,
                        attempted: OrderStatus::PendingPayment,
                    });
                }
                let now = Utc::now();
                if self.payment_lease_until.is_some_and(|lease| lease > now) {
                    return Err(OrderError::PaymentInFlight(self.id.clone()));
                }
                self.payment_lease_until = Some(until);
                self.updated_at = now;
                Ok(OrderActionResult::PaymentClaim(PaymentClaim::Claimed))
            }
            OrderAction::RecordCorrelation(correlation) => {
                match &self.checkout_request_id {
                    Some(existing) if *existing == correlation.checkout_request_id => {
                        self.payment_lease_until = None;
                    }
                    Some(existing) => {
                        return Err(OrderError::CorrelationMismatch {
                            order_id: self.id.clone(),
                            existing: existing.clone(),
                        });
                    }
                    None => {
                        self.merchant_request_id = Some(correlation.merchant_request_id);
                        self.checkout_request_id = Some(correlation.checkout_request_id);
                        self.payment_error = None;
                        self.payment_lease_until = None;
                        self.updated_at = Utc::now();
                    }
                }
                Ok(OrderActionResult::Recorded)
            }
            OrderAction::RecordPaymentError(message) => {
                self.payment_error = Some(message);
                self.payment_lease_until = None;
                self.updated_at = Utc::now();
                Ok(OrderActionResult::Recorded)
            }
            OrderAction::RecordReceipt(receipt) => {
                self.mpesa_receipt = Some(receipt);
                self.updated_at = Utc::now();
                Ok(OrderActionResult::Recorded)
            }
            OrderAction::ReleaseReservation => {
                if self.reservation.is_releasable() {
                    self.reservation = ReservationState::Released;
                    self.updated_at = Utc::now();
                }
                Ok(OrderActionResult::Recorded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::{GatewayCorrelation, LineItem, PaymentMethod, ShippingInfo};

    fn pending_order() -> Order {
        let params = OrderCreate {
            user_id: "user_1".into(),
            items: vec![LineItem {
                product_id: "1".into(),
                name: "Headphones".into(),
                quantity: 2,
                unit_price: Decimal::new(19999, 2),
            }],
            shipping: ShippingInfo { name: "A".into(), address: "B".into(), phone: "0712345678".into() },
            payment_method: PaymentMethod::Mpesa,
            payment_lease_until: None,
        };
        Order::from_create_params("order_1".into(), params).unwrap()
    }

    fn transition(order: &mut Order, from: &[OrderStatus], to: OrderStatus) -> Result<OrderActionResult, OrderError> {
        order.handle_action(OrderAction::Transition { from: from.to_vec(), to })
    }

    #[test]
    fn create_derives_total_and_initial_status() {
        let order = pending_order();
        assert_eq!(order.total, Decimal::new(39998, 2));
        assert_eq!(order.status, OrderStatus::PendingPayment);
        assert_eq!(order.reservation, ReservationState::Held);
    }

    #[test]
    fn duplicate_payment_transition_is_rejected_without_change() {
        let mut order = pending_order();
        transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Paid).unwrap();
        assert_eq!(order.reservation, ReservationState::Committed);

        let err = transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Paid).unwrap_err();
        assert_eq!(
            err,
            OrderError::Conflict { order_id: "order_1".into(), current: OrderStatus::Paid, attempted: OrderStatus::Paid }
        );
        let late_failure = transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::PaymentFailed);
        assert!(late_failure.is_err());
        assert_eq!(order.status, OrderStatus::Paid);
    }

    #[test]
    fn cancelled_order_cannot_be_paid() {
        let mut order = pending_order();
        transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Cancelled).unwrap();
        assert!(transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Paid).is_err());
        // Even a caller that lists the current status cannot leave a terminal state.
        assert!(transition(&mut order, &[OrderStatus::Cancelled], OrderStatus::Paid).is_err());
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn override_bypasses_lifecycle() {
        let mut order = pending_order();
        transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Cancelled).unwrap();
        let result = order.handle_action(OrderAction::Override(OrderStatus::Shipped)).unwrap();
        assert_eq!(result, OrderActionResult::Transitioned { from: OrderStatus::Cancelled, to: OrderStatus::Shipped });
    }

    #[test]
    fn shipped_reservation_is_never_released() {
        let mut order = pending_order();
        transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Paid).unwrap();
        transition(&mut order, &[OrderStatus::Paid], OrderStatus::Shipped).unwrap();
        assert_eq!(order.reservation, ReservationState::Fulfilled);

        order.handle_action(OrderAction::Override(OrderStatus::Cancelled)).unwrap();
        order.handle_action(OrderAction::ReleaseReservation).unwrap();
        assert_eq!(order.reservation, ReservationState::Fulfilled);
    }

    #[test]
    fn reservation_release_is_idempotent() {
        let mut order = pending_order();
        order.handle_action(OrderAction::ReleaseReservation).unwrap();
        assert_eq!(order.reservation, ReservationState::Released);
        order.handle_action(OrderAction::ReleaseReservation).unwrap();
        assert_eq!(order.reservation, ReservationState::Released);

        // A reactivated order does not get its reservation back.
        transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Paid).unwrap();
        assert_eq!(order.reservation, ReservationState::Released);
    }

    #[test]
    fn payment_lease_admits_one_initiation() {
        let mut order = pending_order();
        let until = Utc::now() + chrono::Duration::seconds(30);
        let claim = |order: &mut Order| order.handle_action(OrderAction::ClaimPaymentInitiation { until });

        assert_eq!(claim(&mut order).unwrap(), OrderActionResult::PaymentClaim(PaymentClaim::Claimed));
        assert_eq!(claim(&mut order).unwrap_err(), OrderError::PaymentInFlight("order_1".into()));

        // A recorded failure hands the lease back.
        order.handle_action(OrderAction::RecordPaymentError("timeout".into())).unwrap();
        assert_eq!(claim(&mut order).unwrap(), OrderActionResult::PaymentClaim(PaymentClaim::Claimed));

        let correlation = GatewayCorrelation { merchant_request_id: "m-1".into(), checkout_request_id: "ws_CO_1".into() };
        order.handle_action(OrderAction::RecordCorrelation(correlation.clone())).unwrap();
        assert_eq!(
            claim(&mut order).unwrap(),
            OrderActionResult::PaymentClaim(PaymentClaim::AlreadyInitiated(correlation))
        );
    }

    #[test]
    fn expired_lease_can_be_reclaimed() {
        let mut order = pending_order();
        order.payment_lease_until = Some(Utc::now() - chrono::Duration::seconds(1));
        let until = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(
            order.handle_action(OrderAction::ClaimPaymentInitiation { until }).unwrap(),
            OrderActionResult::PaymentClaim(PaymentClaim::Claimed)
        );

        transition(&mut order, &[OrderStatus::PendingPayment], OrderStatus::Cancelled).unwrap();
        assert!(matches!(
            order.handle_action(OrderAction::ClaimPaymentInitiation { until }),
            Err(OrderError::Conflict { current: OrderStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let params = OrderCreate {
            user_id: "user_1".into(),
            items: vec![LineItem { product_id: "1".into(), name: "Gold".into(), quantity: 2, unit_price: Decimal::MAX }],
            shipping: ShippingInfo { name: "A".into(), address: "B".into(), phone: "1".into() },
            payment_method: PaymentMethod::CashOnDelivery,
            payment_lease_until: None,
        };
        assert_eq!(
            Order::from_create_params("o".into(), params).unwrap_err(),
            OrderError::ValidationError("order total is too large".into())
        );
    }

    #[test]
    fn correlation_is_idempotent_but_not_overwritable() {
        let mut order = pending_order();
        let correlation = GatewayCorrelation {
            merchant_request_id: "m-1".into(),
            checkout_request_id: "ws_CO_1".into(),
        };
        order.handle_action(OrderAction::RecordCorrelation(correlation.clone())).unwrap();
        order.handle_action(OrderAction::RecordCorrelation(correlation.clone())).unwrap();
        assert_eq!(order.correlation(), Some(correlation));

        let other = GatewayCorrelation { merchant_request_id: "m-2".into(), checkout_request_id: "ws_CO_2".into() };
        assert!(matches!(
            order.handle_action(OrderAction::RecordCorrelation(other)),
            Err(OrderError::CorrelationMismatch { .. })
        ));
    }

    #[test]
    fn empty_orders_are_rejected() {
        let params = OrderCreate {
            user_id: "user_1".into(),
            items: Vec::new(),
            shipping: ShippingInfo { name: "A".into(), address: "B".into(), phone: "1".into() },
            payment_method: PaymentMethod::CashOnDelivery,
            payment_lease_until: None,
        };
        assert!(matches!(Order::from_create_params("o".into(), params), Err(OrderError::ValidationError(_))));
    }
}
