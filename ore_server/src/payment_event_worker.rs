use std::sync::Arc;

use futures::future::BoxFuture;
use log::*;
use ore_engine::{
    events::{EventHandler, EventProducer, Handler},
    payment_objects::{EventOutcome, PaymentEvent},
    PaymentFlowApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

pub const PAYMENT_EVENT_BUFFER_SIZE: usize = 50;

/// Starts the worker that feeds asynchronous payment events (the sandbox confirmation timer) into the reconciliation
/// controller. Do not await the returned JoinHandle, as it will run until every producer has been dropped.
pub fn start_payment_event_worker(
    api: PaymentFlowApi<SqliteDatabase>,
) -> (EventProducer<PaymentEvent>, JoinHandle<()>) {
    let handler: Handler<PaymentEvent> = Arc::new(move |event| {
        let api = api.clone();
        Box::pin(async move {
            let correlation = event.correlation.clone();
            match api.apply_event(event).await {
                Ok(EventOutcome::Applied(order)) => {
                    info!("⏲️ Payment event for {correlation} applied. Order {} is now {}", order.id, order.statuses());
                },
                Ok(EventOutcome::NoOp(order)) => debug!("⏲️ Payment event for order {} changed nothing", order.id),
                Ok(EventOutcome::Unrecognized(c)) => warn!("⏲️ Payment event for {c} does not match any order"),
                Err(e) => error!("⏲️ Could not apply payment event for {correlation}. {e}"),
            }
        }) as BoxFuture<'static, ()>
    });
    let handler = EventHandler::new(PAYMENT_EVENT_BUFFER_SIZE, handler);
    let producer = handler.subscribe();
    info!("⏲️ Payment event worker started");
    let join_handle = tokio::spawn(handler.start_handler());
    (producer, join_handle)
}
