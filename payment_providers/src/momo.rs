use std::{fmt::Display, sync::Arc};

use log::*;
use ore_common::{Money, Secret};
use reqwest::{header::HeaderValue, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{token_cache::AccessToken, MomoConfig, ProviderApiError, TokenCache};

/// Client for the MTN Mobile Money collection API.
///
/// A payment is a request-to-pay sent to the customer's phone. The customer approves it on the handset, after which
/// the transaction status becomes `SUCCESSFUL` (or `FAILED`). Clones share the HTTP client and the access token.
#[derive(Clone)]
pub struct MomoApi {
    config: MomoConfig,
    client: Client,
    tokens: Arc<TokenCache>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomoPaymentStatus {
    Pending,
    Successful,
    Failed,
    Rejected,
    Timeout,
    #[serde(other)]
    Unknown,
}

impl Display for MomoPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Successful => "SUCCESSFUL",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
            Self::Timeout => "TIMEOUT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// The answer to a request-to-pay status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomoTransactionStatus {
    pub status: MomoPaymentStatus,
    #[serde(default)]
    pub financial_transaction_id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub reason: Option<serde_json::Value>,
}

/// The body MoMo posts to the callback URL when a request-to-pay settles. `external_id` is the order id we sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomoCallback {
    pub external_id: String,
    pub status: MomoPaymentStatus,
    #[serde(default)]
    pub financial_transaction_id: Option<String>,
    #[serde(default)]
    pub reason: Option<serde_json::Value>,
}

impl MomoCallback {
    pub fn from_json(body: &str) -> Result<Self, ProviderApiError> {
        serde_json::from_str(body).map_err(|e| ProviderApiError::JsonError(e.to_string()))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl MomoApi {
    pub fn new(config: MomoConfig) -> Result<Self, ProviderApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client, tokens: Arc::new(TokenCache::new()) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/collection{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn subscription_key(&self) -> Result<HeaderValue, ProviderApiError> {
        HeaderValue::from_str(self.config.subscription_key.reveal())
            .map_err(|e| ProviderApiError::Initialization(format!("Invalid subscription key. {e}")))
    }

    async fn fetch_token(&self) -> Result<AccessToken, ProviderApiError> {
        debug!("📱️ Requesting a new MoMo access token");
        let response = self
            .client
            .post(self.url("/token/"))
            .basic_auth(&self.config.api_user, Some(self.config.api_key.reveal()))
            .header("Ocp-Apim-Subscription-Key", self.subscription_key()?)
            .send()
            .await
            .map_err(|e| ProviderApiError::RestRequestError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            warn!("📱️ MoMo refused to issue a token. {status}: {message}");
            return Err(ProviderApiError::Authentication(format!("{status}: {message}")));
        }
        let token = response.json::<TokenResponse>().await.map_err(|e| ProviderApiError::JsonError(e.to_string()))?;
        Ok(AccessToken::new(token.access_token, token.expires_in))
    }

    /// A bearer token from the shared cache, refreshed if needed.
    pub async fn access_token(&self) -> Result<Secret<String>, ProviderApiError> {
        self.tokens.get_or_refresh(|| self.fetch_token()).await
    }

    /// Adds the MoMo auth headers. The token is returned too, so that a 401 invalidates exactly that token.
    async fn authorized(&self, builder: RequestBuilder) -> Result<(RequestBuilder, Secret<String>), ProviderApiError> {
        let token = self.access_token().await?;
        let builder = builder
            .bearer_auth(token.reveal())
            .header("Ocp-Apim-Subscription-Key", self.subscription_key()?)
            .header("X-Target-Environment", &self.config.target_environment);
        Ok((builder, token))
    }

    /// Asks `phone` to approve a payment of `amount`. Returns the reference id that identifies the request from now on.
    pub async fn request_to_pay(
        &self,
        amount: Money,
        currency: &str,
        phone: &str,
        external_id: &str,
    ) -> Result<String, ProviderApiError> {
        let reference_id = Uuid::new_v4().to_string();
        let body = json!({
            "amount": amount.value().to_string(),
            "currency": currency,
            "externalId": external_id,
            "payer": { "partyIdType": "MSISDN", "partyId": phone },
            "payerMessage": format!("Payment for order {external_id}"),
            "payeeNote": format!("Order {external_id}"),
        });
        let mut req =
            self.client.post(self.url("/v1_0/requesttopay")).header("X-Reference-Id", &reference_id).json(&body);
        if let Some(callback) = &self.config.callback_url {
            req = req.header("X-Callback-Url", callback);
        }
        let (req, token) = self.authorized(req).await?;
        let response = req.send().await.map_err(|e| ProviderApiError::RestRequestError(e.to_string()))?;
        match response.status() {
            StatusCode::ACCEPTED | StatusCode::OK => {
                info!("📱️ Request-to-pay {reference_id} for {amount} {currency} sent (order {external_id})");
                Ok(reference_id)
            },
            status => {
                let message = response.text().await.unwrap_or_default();
                if status == StatusCode::UNAUTHORIZED {
                    self.tokens.invalidate(&token).await;
                }
                warn!("📱️ Request-to-pay for order {external_id} was refused. {status}: {message}");
                Err(ProviderApiError::QueryError { status: status.as_u16(), message })
            },
        }
    }

    pub async fn request_to_pay_status(&self, reference_id: &str) -> Result<MomoTransactionStatus, ProviderApiError> {
        let req = self.client.get(self.url(&format!("/v1_0/requesttopay/{reference_id}")));
        let (req, token) = self.authorized(req).await?;
        let response = req.send().await.map_err(|e| ProviderApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            let status = response
                .json::<MomoTransactionStatus>()
                .await
                .map_err(|e| ProviderApiError::JsonError(e.to_string()))?;
            trace!("📱️ Request-to-pay {reference_id} is {}", status.status);
            Ok(status)
        } else {
            let status = response.status().as_u16();
            if status == 401 {
                self.tokens.invalidate(&token).await;
            }
            let message = response.text().await.map_err(|e| ProviderApiError::RestResponseError(e.to_string()))?;
            Err(ProviderApiError::QueryError { status, message })
        }
    }
}
