use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, PaymentStatus},
    events::{EventProducers, OrderConfirmedEvent},
    ore_api::errors::PaymentFlowError,
    payment_objects::{
        Correlation,
        EventOutcome,
        InitiateParams,
        PaymentEvent,
        PaymentEventStatus,
        PaymentSession,
        ProviderKind,
        WebhookPayload,
    },
    providers::sandbox::ConfirmationScheduler,
    traits::{OrderManagement, PaymentProvider, StoreError},
};

/// `PaymentFlowApi` is the reconciliation controller. Every payment signal, whatever its source (a client poll, a
/// provider webhook or the sandbox timer), ends up in [`PaymentFlowApi::apply_event`].
///
/// Signals can arrive more than once, concurrently, and in any order. The order record only ever moves forward, and
/// the confirmation event is published by the one caller whose conditional write actually moved the payment to `PAID`.
#[derive(Clone)]
pub struct PaymentFlowApi<B> {
    db: B,
    producers: EventProducers,
    sandbox: Option<ConfirmationScheduler>,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, sandbox: None }
    }

    /// Lets the API stop pending sandbox confirmations once some other signal has settled the payment.
    pub fn with_sandbox_scheduler(mut self, scheduler: ConfirmationScheduler) -> Self {
        self.sandbox = Some(scheduler);
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    fn cancel_sandbox_confirmation(&self, order_id: &OrderId) {
        if let Some(scheduler) = &self.sandbox {
            if scheduler.cancel(order_id) {
                debug!("🔄️ Pending sandbox confirmation for order {order_id} cancelled");
            }
        }
    }
}

impl<B> PaymentFlowApi<B>
where B: OrderManagement
{
    async fn find_order(&self, correlation: &Correlation) -> Result<Option<Order>, StoreError> {
        match correlation {
            Correlation::TransactionId(txid) => self.db.fetch_order_by_transaction_id(txid).await,
            Correlation::OrderId(oid) => self.db.fetch_order(oid).await,
        }
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, PaymentFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentFlowError::OrderNotFound(order_id.clone()))
    }

    /// Applies a normalised payment event to the matching order.
    ///
    /// * `SUCCESSFUL` moves the payment to `PAID` (and a `PENDING` order to `PAID`) unless it is already paid. Only
    ///   the call that performs the change publishes [`OrderConfirmedEvent`]. Cancelled orders record the payment but
    ///   are not confirmed.
    /// * `FAILED` moves a `PENDING` payment to `FAILED`. It never overrides `PAID`, and never touches the order
    ///   status.
    /// * `PENDING` changes nothing.
    ///
    /// Only the provider that opened the order's current payment session can settle it. An event that matches no
    /// order, or an order whose session belongs to another provider (or that has no session at all), is logged and
    /// reported as [`EventOutcome::Unrecognized`]; it is not an error.
    pub async fn apply_event(&self, event: PaymentEvent) -> Result<EventOutcome, PaymentFlowError> {
        let Some(order) = self.find_order(&event.correlation).await? else {
            warn!(
                "🔄️ {} event from {} for {} does not match any order. Ignoring it.",
                event.status, event.provider, event.correlation
            );
            return Ok(EventOutcome::Unrecognized(event.correlation.to_string()));
        };
        if !owns_session(&order, event.provider) {
            warn!(
                "🔄️ {} event from {} for order {} ignored. The order's payment session belongs to {}.",
                event.status,
                event.provider,
                order.id,
                session_owner(&order)
            );
            return Ok(EventOutcome::Unrecognized(event.correlation.to_string()));
        }
        trace!("🔄️ {} event from {} matched order {}", event.status, event.provider, order.id);
        match event.status {
            PaymentEventStatus::Successful => self.apply_successful(order, &event).await,
            PaymentEventStatus::Failed => self.apply_failed(order, &event).await,
            PaymentEventStatus::Pending => {
                trace!("🔄️ Order {} is still awaiting payment ({})", order.id, event.provider_status);
                Ok(EventOutcome::NoOp(order))
            },
        }
    }

    async fn apply_successful(&self, order: Order, event: &PaymentEvent) -> Result<EventOutcome, PaymentFlowError> {
        self.cancel_sandbox_confirmation(&order.id);
        match self.db.mark_order_paid(&order.id, &event.payment_info()).await? {
            Some(paid) => {
                if paid.order_status == OrderStatusType::Cancelled {
                    warn!(
                        "🔄️ Payment of {} received via {} for cancelled order {}. The payment is recorded, but the \
                         order stays cancelled. It may need a refund.",
                        paid.total_price, event.provider, paid.id
                    );
                } else {
                    info!("🔄️ Order {} paid via {}", paid.id, event.provider);
                    self.producers.publish_order_confirmed(OrderConfirmedEvent::new(paid.clone())).await;
                }
                Ok(EventOutcome::Applied(paid))
            },
            None => {
                debug!("🔄️ Order {} was already paid. Nothing to do.", order.id);
                let current = self.db.fetch_order(&order.id).await?.unwrap_or(order);
                Ok(EventOutcome::NoOp(current))
            },
        }
    }

    async fn apply_failed(&self, order: Order, event: &PaymentEvent) -> Result<EventOutcome, PaymentFlowError> {
        self.cancel_sandbox_confirmation(&order.id);
        match self.db.mark_payment_failed(&order.id, &event.payment_info()).await? {
            Some(failed) => {
                info!("🔄️ Payment for order {} failed via {} ({})", failed.id, event.provider, event.provider_status);
                Ok(EventOutcome::Applied(failed))
            },
            None => {
                debug!(
                    "🔄️ Ignoring failure from {} for order {}. Its payment status is already {}",
                    event.provider, order.id, order.payment_status
                );
                let current = self.db.fetch_order(&order.id).await?.unwrap_or(order);
                Ok(EventOutcome::NoOp(current))
            },
        }
    }

    /// Opens a payment session with `provider` and records its reference as the order's transaction id.
    ///
    /// The provider is called at most once. If it fails, the order is left exactly as it was.
    pub async fn start_payment<P: PaymentProvider>(
        &self,
        provider: &P,
        order_id: &OrderId,
        params: &InitiateParams,
    ) -> Result<PaymentSession, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        check_can_start_payment(&order)?;
        if !provider.supports(order.payment_method) {
            return Err(PaymentFlowError::UnsupportedPaymentMethod {
                provider: provider.kind(),
                method: order.payment_method,
            });
        }
        let session = provider.initiate(&order, params).await.map_err(|e| {
            warn!("🔄️ Could not start a {} payment for order {}: {e}", provider.kind(), order.id);
            e
        })?;
        let info = format!("{}: {}", provider.kind(), session.status);
        match self.db.attach_transaction_id(&order.id, provider.kind(), &session.reference_id, &info).await? {
            Some(_) => {
                info!("🔄️ {} payment session {} opened for order {}", provider.kind(), session.reference_id, order.id);
                Ok(session)
            },
            None => {
                warn!(
                    "🔄️ Order {} changed while the {} session {} was being opened. The session will not be tracked.",
                    order.id,
                    provider.kind(),
                    session.reference_id
                );
                // The sandbox would otherwise confirm a session we just discarded.
                self.cancel_sandbox_confirmation(&order.id);
                let current = self.fetch_order(&order.id).await?;
                check_can_start_payment(&current)?;
                Err(PaymentFlowError::SessionAlreadyStarted(order.id))
            },
        }
    }

    /// Asks the provider for the payment state of the order's open session, and applies the answer.
    pub async fn poll_payment<P: PaymentProvider>(
        &self,
        provider: &P,
        order_id: &OrderId,
    ) -> Result<EventOutcome, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        self.refresh_from_provider(provider, order).await
    }

    async fn refresh_from_provider<P: PaymentProvider>(
        &self,
        provider: &P,
        order: Order,
    ) -> Result<EventOutcome, PaymentFlowError> {
        if order.payment_status == PaymentStatus::Paid {
            return Ok(EventOutcome::NoOp(order));
        }
        let txid = session_reference(&order, provider.kind())?.to_string();
        let status = provider.query_status(&txid).await?;
        debug!("🔄️ {} reports {} for order {}", provider.kind(), status.provider_status, order.id);
        let event =
            PaymentEvent::new(provider.kind(), Correlation::TransactionId(txid), status.status, status.provider_status);
        self.apply_event(event).await
    }

    /// Client-side confirmation of a payment intent. Like [`Self::poll_payment`], but the resulting event is matched
    /// by the order id rather than the transaction id.
    pub async fn confirm_payment<P: PaymentProvider>(
        &self,
        provider: &P,
        order_id: &OrderId,
    ) -> Result<EventOutcome, PaymentFlowError> {
        let order = self.fetch_order(order_id).await?;
        if order.payment_status == PaymentStatus::Paid {
            return Ok(EventOutcome::NoOp(order));
        }
        let reference = session_reference(&order, provider.kind())?;
        let status = provider.query_status(reference).await?;
        let event = PaymentEvent::new(
            provider.kind(),
            Correlation::OrderId(order.id.clone()),
            status.status,
            status.provider_status,
        );
        self.apply_event(event).await
    }

    /// Authenticates and parses a webhook with the provider that sent it, then applies the event.
    ///
    /// If the provider cannot vouch for its webhooks, the webhook only identifies the order. The payment state is
    /// then read from the provider for the order's open session, and the status claimed in the webhook is ignored.
    pub async fn process_webhook<P: PaymentProvider>(
        &self,
        provider: &P,
        payload: &WebhookPayload,
    ) -> Result<EventOutcome, PaymentFlowError> {
        let event = provider.handle_webhook(payload).await.map_err(|e| {
            warn!("🔄️ Rejected {} webhook: {e}", provider.kind());
            e
        })?;
        if provider.verifies_webhooks() {
            return self.apply_event(event).await;
        }
        let order = match self.find_order(&event.correlation).await? {
            Some(order) if owns_session(&order, provider.kind()) => order,
            _ => {
                warn!(
                    "🔄️ {} webhook for {} does not match an open {} session. Ignoring it.",
                    provider.kind(),
                    event.correlation,
                    provider.kind()
                );
                return Ok(EventOutcome::Unrecognized(event.correlation.to_string()));
            },
        };
        debug!(
            "🔄️ {} webhook claims {} for order {}. Checking with the provider.",
            provider.kind(),
            event.provider_status,
            order.id
        );
        self.refresh_from_provider(provider, order).await
    }
}

fn owns_session(order: &Order, provider: ProviderKind) -> bool {
    order.payment_details.transaction_id.is_some() && order.payment_details.provider == Some(provider)
}

fn session_owner(order: &Order) -> String {
    order.payment_details.provider.map(|p| p.to_string()).unwrap_or_else(|| "no provider".to_string())
}

/// The transaction id of the order's open session, if `provider` opened it.
fn session_reference(order: &Order, provider: ProviderKind) -> Result<&str, PaymentFlowError> {
    match order.payment_details.transaction_id.as_deref() {
        None => Err(PaymentFlowError::NoPaymentSession(order.id.clone())),
        Some(_) if !owns_session(order, provider) => {
            Err(PaymentFlowError::WrongProvider { order_id: order.id.clone(), provider })
        },
        Some(txid) => Ok(txid),
    }
}

fn check_can_start_payment(order: &Order) -> Result<(), PaymentFlowError> {
    if order.order_status == OrderStatusType::Cancelled {
        return Err(PaymentFlowError::OrderCancelled(order.id.clone()));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(PaymentFlowError::AlreadyPaid(order.id.clone()));
    }
    if order.payment_status == PaymentStatus::Pending && order.payment_details.transaction_id.is_some() {
        return Err(PaymentFlowError::SessionAlreadyStarted(order.id.clone()));
    }
    Ok(())
}
