use log::*;
use ore_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct MomoConfig {
    pub base_url: String,
    pub subscription_key: Secret<String>,
    pub api_user: String,
    pub api_key: Secret<String>,
    pub target_environment: String,
    pub callback_url: Option<String>,
}

impl MomoConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("ORE_MOMO_BASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ ORE_MOMO_BASE_URL not set, using the MoMo sandbox");
            "https://sandbox.momodeveloper.mtn.com".to_string()
        });
        let subscription_key = Secret::new(std::env::var("ORE_MOMO_SUBSCRIPTION_KEY").unwrap_or_else(|_| {
            warn!("🪛️ ORE_MOMO_SUBSCRIPTION_KEY not set, using (probably useless) default");
            "00000000000000000000000000000000".to_string()
        }));
        let api_user = std::env::var("ORE_MOMO_API_USER").unwrap_or_else(|_| {
            warn!("🪛️ ORE_MOMO_API_USER not set, using (probably useless) default");
            "00000000-0000-0000-0000-000000000000".to_string()
        });
        let api_key = Secret::new(std::env::var("ORE_MOMO_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ ORE_MOMO_API_KEY not set, using (probably useless) default");
            "00000000000000000000000000000000".to_string()
        }));
        let target_environment = std::env::var("ORE_MOMO_TARGET_ENVIRONMENT").unwrap_or_else(|_| {
            info!("🪛️ ORE_MOMO_TARGET_ENVIRONMENT not set, using sandbox");
            "sandbox".to_string()
        });
        let callback_url = std::env::var("ORE_MOMO_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        Self { base_url, subscription_key, api_user, api_key, target_environment, callback_url }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl StripeConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("ORE_STRIPE_API_URL").unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let secret_key = Secret::new(std::env::var("ORE_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ ORE_STRIPE_SECRET_KEY not set, using (probably useless) default");
            "sk_test_0000000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("ORE_STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ ORE_STRIPE_WEBHOOK_SECRET not set. Stripe webhooks will fail signature checks.");
            String::default()
        }));
        Self { api_url, secret_key, webhook_secret }
    }
}
