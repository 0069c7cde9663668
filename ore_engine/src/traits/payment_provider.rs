use thiserror::Error;

use crate::{
    db_types::{Order, PaymentMethod},
    payment_objects::{InitiateParams, PaymentEvent, PaymentSession, ProviderKind, ProviderStatus, WebhookPayload},
};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Could not authenticate with the payment provider: {0}")]
    Authentication(String),
    #[error("Could not reach the payment provider: {0}")]
    Network(String),
    #[error("The payment provider sent a response we could not understand: {0}")]
    MalformedResponse(String),
    #[error("The webhook signature is invalid: {0}")]
    InvalidSignature(String),
    #[error("The payment provider does not know about reference {0}")]
    UnknownReference(String),
    #[error("The payment provider is not configured correctly: {0}")]
    Configuration(String),
}

/// A payment gateway.
///
/// Errors from any of these methods are reported back to whoever asked. In particular, a provider error is never
/// interpreted as a failed payment.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    fn kind(&self) -> ProviderKind;

    /// Whether this provider can take payment for orders placed with the given method.
    fn supports(&self, method: PaymentMethod) -> bool;

    /// Opens a payment session for the order. The returned session's `reference_id` is the correlation id that
    /// subsequent status queries and webhooks use.
    async fn initiate(&self, order: &Order, params: &InitiateParams) -> Result<PaymentSession, ProviderError>;

    /// Reads the current state of the payment identified by `reference_id`.
    async fn query_status(&self, reference_id: &str) -> Result<ProviderStatus, ProviderError>;

    /// Authenticates and parses an inbound webhook into a payment event.
    async fn handle_webhook(&self, payload: &WebhookPayload) -> Result<PaymentEvent, ProviderError>;

    /// Whether [`Self::handle_webhook`] proves where the webhook came from (a signature, for instance).
    ///
    /// Webhooks from providers that return `false` are only a hint. The status they claim is ignored and the order's
    /// open session is queried with [`Self::query_status`] instead.
    fn verifies_webhooks(&self) -> bool {
        true
    }
}
