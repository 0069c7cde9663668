//! Bearer token cache for APIs that hand out short-lived access tokens.
//!
//! A cached token is reused until [`TOKEN_EXPIRY_MARGIN_SECS`] before it expires. Refreshes are single-flight: the
//! first caller to find the token stale fetches a new one while holding the lock, and everyone who arrives in the
//! meantime waits for that result instead of asking the provider again.
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use log::*;
use ore_common::Secret;
use tokio::sync::Mutex;

use crate::ProviderApiError;

/// Tokens are treated as expired this many seconds before the provider says they are.
pub const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: String, expires_in_secs: i64) -> Self {
        Self { token: Secret::new(token), expires_at: Utc::now() + Duration::seconds(expires_in_secs) }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct TokenCache {
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached token if it is still fresh, otherwise calls `fetch` and caches the result.
    ///
    /// A failed fetch leaves the cache empty, so the next caller tries again.
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Result<Secret<String>, ProviderApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, ProviderApiError>>,
    {
        let mut guard = self.current.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            trace!("🔑️ Reusing cached access token");
            return Ok(token.token.clone());
        }
        debug!("🔑️ Access token missing or about to expire. Fetching a new one.");
        *guard = None;
        let token = fetch().await?;
        debug!("🔑️ New access token valid until {}", token.expires_at);
        let secret = token.token.clone();
        *guard = Some(token);
        Ok(secret)
    }

    /// Drops the cached token after the provider rejected `stale`.
    ///
    /// If the cache has moved on to a newer token in the meantime, that token is kept.
    pub async fn invalidate(&self, stale: &Secret<String>) {
        let mut guard = self.current.lock().await;
        if guard.as_ref().is_some_and(|t| t.token.reveal() == stale.reveal()) {
            debug!("🔑️ Access token was rejected. Dropping it.");
            *guard = None;
        } else {
            trace!("🔑️ A rejected access token has already been replaced");
        }
    }
}
