mod config;
mod error;
mod momo;
mod stripe;
mod token_cache;

pub use config::{MomoConfig, StripeConfig};
pub use error::ProviderApiError;
pub use momo::{MomoApi, MomoCallback, MomoPaymentStatus, MomoTransactionStatus};
pub use stripe::{
    sign_webhook_payload,
    verify_webhook_signature,
    IntentStatus,
    PaymentIntent,
    StripeApi,
    StripeEvent,
    SIGNATURE_TOLERANCE_SECS,
};
pub use token_cache::{AccessToken, TokenCache, TOKEN_EXPIRY_MARGIN_SECS};
