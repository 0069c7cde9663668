use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::db_types::Order;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Could not deliver notification to {recipient}: {reason}")]
    DeliveryFailed { recipient: String, reason: String },
    #[error("The notification has no recipient")]
    MissingRecipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    OrderConfirmed,
    OrderDelivered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub payload: Value,
}

impl Notification {
    pub fn order_confirmed(order: &Order) -> Self {
        Self {
            kind: NotificationKind::OrderConfirmed,
            recipient: order.customer_email.clone(),
            payload: json!({
                "order_id": order.id.as_str(),
                "total_price": order.total_price,
                "currency": order.currency,
                "payment_method": order.payment_method,
                "items": order.items,
            }),
        }
    }

    pub fn order_delivered(order: &Order) -> Self {
        Self {
            kind: NotificationKind::OrderDelivered,
            recipient: order.customer_email.clone(),
            payload: json!({
                "order_id": order.id.as_str(),
                "full_name": order.shipping.full_name,
                "city": order.shipping.city,
            }),
        }
    }
}

/// The outbound notification transport (email, SMS, push...). Delivery is fire-and-forget from the engine's point
/// of view: a failure is logged by the caller and never rolls anything back.
#[allow(async_fn_in_trait)]
pub trait NotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}
