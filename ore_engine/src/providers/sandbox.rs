//! The sandbox payment provider.
//!
//! Every session opened with the sandbox succeeds on its own after a fixed delay. The confirmation is delivered as a
//! [`PaymentEvent`] through an [`EventProducer`], exactly as if a real provider had called a webhook, so it goes
//! through the same reconciliation path as everything else.
//!
//! The sandbox reference for a session is the order id, and it is stored as the order's transaction id. Sandbox
//! events are correlated by that transaction id, so they can only ever settle an order whose open session is a
//! sandbox session.
//!
//! The sandbox only serves the payment methods it is configured for ([`DEFAULT_SANDBOX_METHODS`] unless told
//! otherwise). Methods with a real provider flow should not be listed.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use log::*;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::{
    db_types::{Order, OrderId, PaymentMethod},
    events::EventProducer,
    payment_objects::{
        Correlation,
        InitiateParams,
        PaymentEvent,
        PaymentEventStatus,
        PaymentSession,
        ProviderKind,
        ProviderStatus,
        WebhookPayload,
    },
    traits::{PaymentProvider, ProviderError},
};

pub const DEFAULT_SANDBOX_DELAY: Duration = Duration::from_secs(5);
/// Payment methods that have no provider integration of their own.
pub const DEFAULT_SANDBOX_METHODS: [PaymentMethod; 1] = [PaymentMethod::PayPal];
/// A fired confirmation that no payment event has cleared after this long is dropped.
pub const CONFIRMED_RETENTION: Duration = Duration::from_secs(600);

enum Confirmation {
    Scheduled(JoinHandle<()>),
    Confirmed(Instant),
}

/// Keeps one cancellable confirmation timer per order.
///
/// An entry lives until the order's payment is settled (see [`ConfirmationScheduler::cancel`]). Fired confirmations
/// that are never cleared expire after [`CONFIRMED_RETENTION`].
#[derive(Clone)]
pub struct ConfirmationScheduler {
    delay: Duration,
    confirmations: Arc<Mutex<HashMap<OrderId, Confirmation>>>,
}

impl Default for ConfirmationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_SANDBOX_DELAY)
    }
}

impl ConfirmationScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, confirmations: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OrderId, Confirmation>> {
        lock_confirmations(&self.confirmations)
    }

    /// Starts the timer for `order_id`. When it fires, a `SUCCESSFUL` event is published on `producer`.
    /// Any earlier timer for the same order is replaced.
    pub fn schedule(&self, order_id: OrderId, producer: EventProducer<PaymentEvent>) {
        let delay = self.delay;
        let confirmations = Arc::clone(&self.confirmations);
        let id = order_id.clone();
        // Hold the lock while spawning, so the timer cannot fire before its handle is registered.
        let mut guard = self.lock();
        prune_expired(&mut guard, Instant::now());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = lock_confirmations(&confirmations);
                if !matches!(map.get(&id), Some(Confirmation::Scheduled(_))) {
                    return;
                }
                map.insert(id.clone(), Confirmation::Confirmed(Instant::now()));
            }
            info!("⏲️ Sandbox payment for order {id} confirmed");
            let event = PaymentEvent::new(
                ProviderKind::Sandbox,
                Correlation::TransactionId(id.as_str().to_string()),
                PaymentEventStatus::Successful,
                PaymentEventStatus::Successful.to_string(),
            );
            producer.publish_event(event).await;
        });
        let previous = guard.insert(order_id.clone(), Confirmation::Scheduled(handle));
        if let Some(Confirmation::Scheduled(previous)) = previous {
            debug!("⏲️ Replacing the pending sandbox confirmation for order {order_id}");
            previous.abort();
        }
        debug!("⏲️ Sandbox confirmation for order {order_id} scheduled in {}ms", delay.as_millis());
    }

    /// Forgets the order. A timer that has not fired yet is stopped, and `true` is returned in that case.
    ///
    /// Called whenever the order's payment is settled or the order is cancelled.
    pub fn cancel(&self, order_id: &OrderId) -> bool {
        match self.lock().remove(order_id) {
            Some(Confirmation::Scheduled(handle)) => {
                handle.abort();
                debug!("⏲️ Sandbox confirmation for order {order_id} cancelled");
                true
            },
            Some(Confirmation::Confirmed(_)) | None => false,
        }
    }

    /// What the sandbox would report for the order right now. `None` if the sandbox is not tracking the order.
    pub fn status(&self, order_id: &OrderId) -> Option<PaymentEventStatus> {
        self.lock().get(order_id).map(|c| match c {
            Confirmation::Confirmed(_) => PaymentEventStatus::Successful,
            Confirmation::Scheduled(_) => PaymentEventStatus::Pending,
        })
    }

    /// The number of timers that have not fired or been cancelled yet.
    pub fn pending_count(&self) -> usize {
        self.lock().values().filter(|c| matches!(c, Confirmation::Scheduled(_))).count()
    }

    /// The number of orders the sandbox is tracking, fired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune_expired(confirmations: &mut HashMap<OrderId, Confirmation>, now: Instant) {
    confirmations.retain(|id, c| match c {
        Confirmation::Confirmed(at) if now.duration_since(*at) > CONFIRMED_RETENTION => {
            trace!("⏲️ Dropping the stale sandbox confirmation for order {id}");
            false
        },
        _ => true,
    });
}

fn lock_confirmations(
    confirmations: &Mutex<HashMap<OrderId, Confirmation>>,
) -> MutexGuard<'_, HashMap<OrderId, Confirmation>> {
    // The map is always left consistent, so a panic elsewhere does not invalidate it.
    confirmations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Deserialize)]
struct SandboxCallback {
    order_id: OrderId,
    status: PaymentEventStatus,
}

#[derive(Clone)]
pub struct SandboxProvider {
    scheduler: ConfirmationScheduler,
    producer: EventProducer<PaymentEvent>,
    methods: Vec<PaymentMethod>,
}

impl SandboxProvider {
    pub fn new(scheduler: ConfirmationScheduler, producer: EventProducer<PaymentEvent>) -> Self {
        Self { scheduler, producer, methods: DEFAULT_SANDBOX_METHODS.to_vec() }
    }

    /// Replaces the payment methods the sandbox takes payment for.
    pub fn serving(mut self, methods: &[PaymentMethod]) -> Self {
        self.methods = methods.to_vec();
        self
    }

    pub fn scheduler(&self) -> &ConfirmationScheduler {
        &self.scheduler
    }
}

impl PaymentProvider for SandboxProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sandbox
    }

    fn supports(&self, method: PaymentMethod) -> bool {
        self.methods.contains(&method)
    }

    async fn initiate(&self, order: &Order, _params: &InitiateParams) -> Result<PaymentSession, ProviderError> {
        self.scheduler.schedule(order.id.clone(), self.producer.clone());
        Ok(PaymentSession {
            provider: ProviderKind::Sandbox,
            reference_id: order.id.as_str().to_string(),
            amount: order.total_price,
            status: PaymentEventStatus::Pending,
            client_secret: None,
        })
    }

    async fn query_status(&self, reference_id: &str) -> Result<ProviderStatus, ProviderError> {
        let status = self
            .scheduler
            .status(&OrderId::from(reference_id))
            .ok_or_else(|| ProviderError::UnknownReference(reference_id.to_string()))?;
        Ok(ProviderStatus::new(reference_id, status, status.to_string()))
    }

    async fn handle_webhook(&self, payload: &WebhookPayload) -> Result<PaymentEvent, ProviderError> {
        let callback = serde_json::from_str::<SandboxCallback>(&payload.body)
            .map_err(|e| ProviderError::MalformedResponse(format!("Invalid sandbox callback. {e}")))?;
        debug!("⏲️ Sandbox callback for order {}: {}", callback.order_id, callback.status);
        Ok(PaymentEvent::new(
            ProviderKind::Sandbox,
            Correlation::TransactionId(callback.order_id.as_str().to_string()),
            callback.status,
            callback.status.to_string(),
        ))
    }
}
