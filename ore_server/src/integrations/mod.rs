//! Adapters between the engine's [`PaymentProvider`](ore_engine::traits::PaymentProvider) trait and the concrete
//! gateway clients, plus the notification hooks.
use ore_engine::traits::ProviderError;
use payment_providers::ProviderApiError;

pub mod momo;
pub mod notifications;
pub mod stripe;

/// The provider that takes mobile money payments. The wrapper lets the routes tell the two gateways apart.
pub struct MomoGateway<P>(pub P);

/// The provider that takes card payments.
pub struct CardGateway<P>(pub P);

pub(crate) fn provider_error(e: ProviderApiError) -> ProviderError {
    match e {
        ProviderApiError::Initialization(s) => ProviderError::Configuration(s),
        ProviderApiError::RestRequestError(s) => ProviderError::Network(s),
        ProviderApiError::RestResponseError(s) | ProviderApiError::JsonError(s) => ProviderError::MalformedResponse(s),
        ProviderApiError::Authentication(s) => ProviderError::Authentication(s),
        ProviderApiError::InvalidSignature(s) => ProviderError::InvalidSignature(s),
        ProviderApiError::QueryError { status: 404, message } => ProviderError::UnknownReference(message),
        ProviderApiError::QueryError { status: 401 | 403, message } => ProviderError::Authentication(message),
        ProviderApiError::QueryError { status, message } => ProviderError::Network(format!("{status}: {message}")),
    }
}
