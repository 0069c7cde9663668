use log::*;
use ore_engine::{
    events::{EventHandlers, EventHooks},
    traits::{Notification, NotificationError, NotificationSink},
};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;

/// A notification sink that writes customer notifications to the log. Swap in a mail or SMS transport here.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        if notification.recipient.trim().is_empty() {
            return Err(NotificationError::MissingRecipient);
        }
        info!("📬️ {:?} notification for {}: {}", notification.kind, notification.recipient, notification.payload);
        Ok(())
    }
}

/// Assigns the customer notification hooks.
///
/// 1. OrderConfirmedEvent - sent exactly once, when a payment first moves an order to PAID.
/// 2. OrderDeliveredEvent - sent when the seller (or an admin) first marks the order as delivered.
///
/// Delivery failures are logged and otherwise ignored. The order state has already been committed by the time these
/// handlers run.
pub fn create_notification_handlers(sink: LogNotifier) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_confirmed(move |ev| {
        let notification = Notification::order_confirmed(&ev.order);
        Box::pin(async move { deliver(sink, notification).await })
    });
    hooks.on_order_delivered(move |ev| {
        let notification = Notification::order_delivered(&ev.order);
        Box::pin(async move { deliver(sink, notification).await })
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}

async fn deliver(sink: LogNotifier, notification: Notification) {
    let kind = notification.kind;
    let recipient = notification.recipient.clone();
    if let Err(e) = sink.notify(notification).await {
        error!("📬️ Could not send {kind:?} notification to '{recipient}'. {e}");
    }
}
