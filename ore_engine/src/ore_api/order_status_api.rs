//! The status projector keeps `order_status`, `payment_status` and `shipping_status` aligned when sellers and admins
//! change them by hand.
//!
//! The allowed changes are computed by two pure functions, [`plan_shipping_update`] and [`plan_order_update`], from a
//! snapshot of the three fields. The result is written with a compare-and-swap on that snapshot, so a concurrent
//! payment confirmation is never overwritten. On a conflict the order is re-read and the plan recomputed.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, OrderStatuses, PaymentStatus, ShippingStatus},
    events::{EventProducers, OrderConfirmedEvent, OrderDeliveredEvent},
    ore_api::errors::OrderStatusError,
    providers::sandbox::ConfirmationScheduler,
    traits::OrderManagement,
};

/// How many times a status update is re-planned after losing a race before giving up.
pub const MAX_STATUS_UPDATE_ATTEMPTS: usize = 5;

/// The seller's view: shipping progress drives the order forward where the payment allows it.
///
/// * Cancelled orders cannot be shipped.
/// * A delivered order cannot go back to an earlier shipping state.
/// * `DELIVERED` promotes the order to `DELIVERED`, but only once it has been paid.
/// * `IN_TRANSIT` promotes a `PENDING` or `PAID` order to `SHIPPED`.
pub fn plan_shipping_update(current: OrderStatuses, requested: ShippingStatus) -> Result<OrderStatuses, String> {
    if current.order_status == OrderStatusType::Cancelled {
        return Err(format!("order is cancelled, so shipping cannot be set to {requested}"));
    }
    if current.order_status == OrderStatusType::Delivered && requested != ShippingStatus::Delivered {
        return Err(format!("order has been delivered, so shipping cannot go back to {requested}"));
    }
    let mut new = current;
    new.shipping_status = requested;
    match requested {
        ShippingStatus::Delivered if current.payment_status == PaymentStatus::Paid => {
            new.order_status = OrderStatusType::Delivered;
        },
        ShippingStatus::InTransit
            if matches!(current.order_status, OrderStatusType::Pending | OrderStatusType::Paid) =>
        {
            new.order_status = OrderStatusType::Shipped;
        },
        _ => {},
    }
    Ok(new)
}

/// The admin's view: any forward change, or a cancellation, with the other fields dragged along.
///
/// * The lifecycle only moves forward: `PENDING`, `PAID`, `SHIPPED`, `DELIVERED`.
/// * `CANCELLED` is final, and `DELIVERED` can be neither undone nor cancelled.
/// * `PAID` forces the payment to `PAID`.
/// * `SHIPPED` and `DELIVERED` move shipping forward to `IN_TRANSIT` and `DELIVERED` respectively.
/// * Setting the current status again changes nothing.
pub fn plan_order_update(current: OrderStatuses, requested: OrderStatusType) -> Result<OrderStatuses, String> {
    if current.order_status == requested {
        return Ok(current);
    }
    match current.order_status {
        OrderStatusType::Cancelled => return Err(format!("order is cancelled and cannot become {requested}")),
        OrderStatusType::Delivered => return Err(format!("order has been delivered and cannot become {requested}")),
        _ => {},
    }
    if let (Some(to), Some(from)) = (requested.progress(), current.order_status.progress()) {
        if to < from {
            return Err(format!("order is {} and cannot go back to {requested}", current.order_status));
        }
    }
    let mut new = current;
    new.order_status = requested;
    match requested {
        OrderStatusType::Paid => new.payment_status = PaymentStatus::Paid,
        OrderStatusType::Shipped if current.shipping_status == ShippingStatus::NotShipped => {
            new.shipping_status = ShippingStatus::InTransit;
        },
        OrderStatusType::Delivered => new.shipping_status = ShippingStatus::Delivered,
        _ => {},
    }
    Ok(new)
}

/// `OrderStatusApi` applies seller and admin status changes and emits the notifications they trigger.
pub struct OrderStatusApi<B> {
    db: B,
    producers: EventProducers,
    sandbox: Option<ConfirmationScheduler>,
}

impl<B> Debug for OrderStatusApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderStatusApi")
    }
}

impl<B> OrderStatusApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, sandbox: None }
    }

    /// Cancelling an order (or force-paying it) stops its pending sandbox confirmation.
    pub fn with_sandbox_scheduler(mut self, scheduler: ConfirmationScheduler) -> Self {
        self.sandbox = Some(scheduler);
        self
    }
}

impl<B> OrderStatusApi<B>
where B: OrderManagement
{
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderStatusError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderStatusError::OrderNotFound(order_id.clone()))
    }

    /// Seller-facing shipping update. See [`plan_shipping_update`] for the rules.
    pub async fn update_shipping_status(
        &self,
        order_id: &OrderId,
        status: ShippingStatus,
    ) -> Result<Order, OrderStatusError> {
        debug!("🚚️ Shipping status for order {order_id} -> {status}");
        self.apply(order_id, |current| plan_shipping_update(current, status)).await
    }

    /// Admin-facing order status update. See [`plan_order_update`] for the rules.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<Order, OrderStatusError> {
        debug!("🚚️ Order status for order {order_id} -> {status}");
        self.apply(order_id, |current| plan_order_update(current, status)).await
    }

    async fn apply<F>(&self, order_id: &OrderId, plan: F) -> Result<Order, OrderStatusError>
    where F: Fn(OrderStatuses) -> Result<OrderStatuses, String> {
        for attempt in 1..=MAX_STATUS_UPDATE_ATTEMPTS {
            let order = self.fetch_order(order_id).await?;
            let current = order.statuses();
            let new = plan(current).map_err(|reason| {
                info!("🚚️ Refusing status change for order {order_id}: {reason}");
                OrderStatusError::Forbidden(reason)
            })?;
            if new == current {
                trace!("🚚️ Order {order_id} already has the requested status");
                return Ok(order);
            }
            match self.db.compare_and_set_statuses(order_id, current, new).await? {
                Some(updated) => {
                    debug!("🚚️ Order {order_id}: ({current}) -> ({new})");
                    self.after_transition(&order, &updated).await;
                    return Ok(updated);
                },
                None => debug!("🚚️ Order {order_id} changed underneath us (attempt {attempt}). Retrying."),
            }
        }
        warn!("🚚️ Gave up updating order {order_id} after {MAX_STATUS_UPDATE_ATTEMPTS} attempts");
        Err(OrderStatusError::ConcurrentModification(order_id.clone()))
    }

    /// Notifications fire on edges only, i.e. when this write is the one that crossed the boundary.
    async fn after_transition(&self, before: &Order, after: &Order) {
        let newly_paid = before.payment_status != PaymentStatus::Paid && after.payment_status == PaymentStatus::Paid;
        if newly_paid {
            self.cancel_sandbox_confirmation(&after.id);
            if after.order_status != OrderStatusType::Cancelled {
                info!("🚚️ Order {} marked as paid by an admin", after.id);
                self.producers.publish_order_confirmed(OrderConfirmedEvent::new(after.clone())).await;
            }
        }
        if before.order_status != OrderStatusType::Delivered && after.order_status == OrderStatusType::Delivered {
            info!("🚚️ Order {} delivered", after.id);
            self.producers.publish_order_delivered(OrderDeliveredEvent::new(after.clone())).await;
        }
        if after.order_status == OrderStatusType::Cancelled {
            info!("🚚️ Order {} cancelled", after.id);
            self.cancel_sandbox_confirmation(&after.id);
        }
    }

    fn cancel_sandbox_confirmation(&self, order_id: &OrderId) {
        if let Some(scheduler) = &self.sandbox {
            if scheduler.cancel(order_id) {
                debug!("🚚️ Pending sandbox confirmation for order {order_id} cancelled");
            }
        }
    }
}
