use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Published exactly once per order, by whoever moved its payment to `PAID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Published when an order's status transitions into `DELIVERED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeliveredEvent {
    pub order: Order,
}

impl OrderDeliveredEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
