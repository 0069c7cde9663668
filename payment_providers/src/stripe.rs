use std::{collections::HashMap, fmt::Display};

use chrono::Utc;
use hmac::{Hmac, Mac};
use log::*;
use ore_common::Money;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

use crate::{ProviderApiError, StripeConfig};

type HmacSha256 = Hmac<Sha256>;

/// Webhooks signed more than this many seconds away from our clock are rejected.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn order_id(&self) -> Option<&str> {
        self.metadata.get("order_id").map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// A webhook event. Only `payment_intent.*` events carry a [`PaymentIntent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

impl StripeEvent {
    pub fn from_json(body: &str) -> Result<Self, ProviderApiError> {
        serde_json::from_str(body).map_err(|e| ProviderApiError::JsonError(e.to_string()))
    }

    pub fn payment_intent(&self) -> Option<PaymentIntent> {
        if !self.event_type.starts_with("payment_intent.") {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, ProviderApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url.trim_end_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ProviderApiError> {
        let response = req
            .bearer_auth(self.config.secret_key.reveal())
            .send()
            .await
            .map_err(|e| ProviderApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
            Err(ProviderApiError::QueryError { status, message })
        }
    }

    /// Creates a payment intent for `amount` (in the currency's smallest unit), tagged with the order id.
    pub async fn create_payment_intent(
        &self,
        amount: Money,
        currency: &str,
        order_id: &str,
    ) -> Result<PaymentIntent, ProviderApiError> {
        let amount = amount.value().to_string();
        let currency = currency.to_ascii_lowercase();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("metadata[order_id]", order_id),
            ("automatic_payment_methods[enabled]", "true"),
        ];
        let req = self.client.post(self.url("/payment_intents")).form(&form);
        let intent = self.send::<PaymentIntent>(req).await?;
        info!("💳️ Payment intent {} created for order {order_id} ({amount} {currency})", intent.id);
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProviderApiError> {
        let req = self.client.get(self.url(&format!("/payment_intents/{intent_id}")));
        let intent = self.send::<PaymentIntent>(req).await?;
        trace!("💳️ Payment intent {intent_id} is {}", intent.status);
        Ok(intent)
    }

    /// Checks the `Stripe-Signature` header against the raw request body using the configured signing secret.
    pub fn verify_webhook(&self, payload: &str, signature_header: &str) -> Result<(), ProviderApiError> {
        let secret = self.config.webhook_secret.reveal();
        if secret.is_empty() {
            return Err(ProviderApiError::InvalidSignature("no webhook signing secret is configured".into()));
        }
        verify_webhook_signature(payload, signature_header, secret, Utc::now().timestamp())
    }
}

fn signature(payload: &str, timestamp: i64, secret: &str) -> Result<HmacSha256, ProviderApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ProviderApiError::InvalidSignature(format!("unusable signing secret. {e}")))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(mac)
}

/// Produces a `Stripe-Signature` header value for `payload`.
pub fn sign_webhook_payload(payload: &str, secret: &str, timestamp: i64) -> Result<String, ProviderApiError> {
    let mac = signature(payload, timestamp, secret)?;
    Ok(format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())))
}

/// Verifies a `Stripe-Signature` header (`t=<unix time>,v1=<hex hmac>[,v1=...]`).
///
/// The signed content is `"{t}.{payload}"`, keyed with the endpoint's signing secret. The timestamp must be within
/// [`SIGNATURE_TOLERANCE_SECS`] of `now`. Any one matching `v1` entry is enough.
pub fn verify_webhook_signature(payload: &str, header: &str, secret: &str, now: i64) -> Result<(), ProviderApiError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| ProviderApiError::InvalidSignature("missing timestamp".into()))?;
    if candidates.is_empty() {
        return Err(ProviderApiError::InvalidSignature("no v1 signature".into()));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(ProviderApiError::InvalidSignature(format!("timestamp {timestamp} is outside the tolerance")));
    }
    let mac = signature(payload, timestamp, secret)?;
    let valid = candidates.iter().filter_map(|c| hex::decode(c).ok()).any(|sig| mac.clone().verify_slice(&sig).is_ok());
    if valid {
        Ok(())
    } else {
        Err(ProviderApiError::InvalidSignature("signature does not match".into()))
    }
}
