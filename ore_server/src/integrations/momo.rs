use log::*;
use ore_engine::{
    db_types::{Order, OrderId, PaymentMethod},
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
use payment_providers::{MomoApi, MomoCallback, MomoPaymentStatus};

use crate::integrations::provider_error;

/// MTN Mobile Money. Payments are request-to-pay prompts on the customer's phone, settled by polling or by callback.
///
/// MoMo callbacks are not signed. A callback only tells us which order to look at, and the payment state is always
/// read back from MoMo for the request-to-pay that the order's session recorded.
#[derive(Clone)]
pub struct MomoProvider {
    api: MomoApi,
}

impl MomoProvider {
    pub fn new(api: MomoApi) -> Self {
        Self { api }
    }
}

/// Only `SUCCESSFUL` and the definitive failures are terminal. Anything we don't recognise keeps the order waiting.
pub fn map_momo_status(status: MomoPaymentStatus) -> PaymentEventStatus {
    match status {
        MomoPaymentStatus::Successful => PaymentEventStatus::Successful,
        MomoPaymentStatus::Failed | MomoPaymentStatus::Rejected | MomoPaymentStatus::Timeout => {
            PaymentEventStatus::Failed
        },
        MomoPaymentStatus::Pending | MomoPaymentStatus::Unknown => PaymentEventStatus::Pending,
    }
}

impl PaymentProvider for MomoProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MoMo
    }

    fn supports(&self, method: PaymentMethod) -> bool {
        method == PaymentMethod::MoMo
    }

    async fn initiate(&self, order: &Order, params: &InitiateParams) -> Result<PaymentSession, ProviderError> {
        let phone = params.phone.as_deref().unwrap_or(order.shipping.phone.as_str());
        let currency = params.currency.as_deref().unwrap_or(order.currency.as_str());
        debug!("📱️ Sending request-to-pay for order {} to {phone}", order.id);
        let reference_id = self
            .api
            .request_to_pay(order.total_price, currency, phone, order.id.as_str())
            .await
            .map_err(provider_error)?;
        Ok(PaymentSession {
            provider: ProviderKind::MoMo,
            reference_id,
            amount: order.total_price,
            status: PaymentEventStatus::Pending,
            client_secret: None,
        })
    }

    async fn query_status(&self, reference_id: &str) -> Result<ProviderStatus, ProviderError> {
        let status = self.api.request_to_pay_status(reference_id).await.map_err(provider_error)?;
        Ok(ProviderStatus::new(reference_id, map_momo_status(status.status), status.status.to_string()))
    }

    async fn handle_webhook(&self, payload: &WebhookPayload) -> Result<PaymentEvent, ProviderError> {
        let callback = MomoCallback::from_json(&payload.body).map_err(provider_error)?;
        debug!("📱️ MoMo callback for order {}: {}", callback.external_id, callback.status);
        Ok(PaymentEvent::new(
            ProviderKind::MoMo,
            Correlation::OrderId(OrderId::from(callback.external_id)),
            map_momo_status(callback.status),
            callback.status.to_string(),
        ))
    }

    fn verifies_webhooks(&self) -> bool {
        false
    }
}
