use log::*;
use ore_engine::{
    db_types::{Order, PaymentMethod},
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
use payment_providers::{IntentStatus, StripeApi, StripeEvent};

use crate::integrations::provider_error;

/// Card payments through Stripe payment intents. The browser completes the payment with the intent's client secret;
/// we learn the result from the webhook or from an explicit confirmation call.
#[derive(Clone)]
pub struct StripeProvider {
    api: StripeApi,
}

impl StripeProvider {
    pub fn new(api: StripeApi) -> Self {
        Self { api }
    }
}

/// Statuses that still need something from the customer or from Stripe are not terminal.
pub fn map_intent_status(status: IntentStatus) -> PaymentEventStatus {
    match status {
        IntentStatus::Succeeded => PaymentEventStatus::Successful,
        IntentStatus::RequiresPaymentMethod | IntentStatus::Canceled => PaymentEventStatus::Failed,
        IntentStatus::Processing
        | IntentStatus::RequiresAction
        | IntentStatus::RequiresConfirmation
        | IntentStatus::RequiresCapture
        | IntentStatus::Unknown => PaymentEventStatus::Pending,
    }
}

/// Webhooks are mapped by event type. A freshly created intent also reports `requires_payment_method`, which must
/// not count as a failure.
pub fn map_event_type(event_type: &str) -> PaymentEventStatus {
    match event_type {
        "payment_intent.succeeded" => PaymentEventStatus::Successful,
        "payment_intent.payment_failed" | "payment_intent.canceled" => PaymentEventStatus::Failed,
        _ => PaymentEventStatus::Pending,
    }
}

impl PaymentProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    fn supports(&self, method: PaymentMethod) -> bool {
        method == PaymentMethod::Card
    }

    async fn initiate(&self, order: &Order, params: &InitiateParams) -> Result<PaymentSession, ProviderError> {
        let currency = params.currency.as_deref().unwrap_or(order.currency.as_str());
        let intent = self
            .api
            .create_payment_intent(order.total_price, currency, order.id.as_str())
            .await
            .map_err(provider_error)?;
        if intent.client_secret.is_none() {
            warn!("💳️ Payment intent {} for order {} came back without a client secret", intent.id, order.id);
        }
        Ok(PaymentSession {
            provider: ProviderKind::Stripe,
            reference_id: intent.id,
            amount: order.total_price,
            status: PaymentEventStatus::Pending,
            client_secret: intent.client_secret,
        })
    }

    async fn query_status(&self, reference_id: &str) -> Result<ProviderStatus, ProviderError> {
        let intent = self.api.retrieve_payment_intent(reference_id).await.map_err(provider_error)?;
        Ok(ProviderStatus::new(reference_id, map_intent_status(intent.status), intent.status.to_string()))
    }

    async fn handle_webhook(&self, payload: &WebhookPayload) -> Result<PaymentEvent, ProviderError> {
        let signature = payload
            .signature
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidSignature("missing Stripe-Signature header".into()))?;
        self.api.verify_webhook(&payload.body, signature).map_err(provider_error)?;
        let event = StripeEvent::from_json(&payload.body).map_err(provider_error)?;
        let intent = event
            .payment_intent()
            .ok_or_else(|| ProviderError::UnknownReference(format!("{} event {}", event.event_type, event.id)))?;
        debug!(
            "💳️ Stripe {} for intent {} of order {} ({})",
            event.event_type,
            intent.id,
            intent.order_id().unwrap_or("<no order_id>"),
            intent.status
        );
        Ok(PaymentEvent::new(
            ProviderKind::Stripe,
            Correlation::TransactionId(intent.id),
            map_event_type(&event.event_type),
            intent.status.to_string(),
        ))
    }
}
