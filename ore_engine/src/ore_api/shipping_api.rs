use std::fmt::Debug;

use log::*;
use ore_common::Money;

use crate::{
    db_types::{NewShippingRate, ShippingRate},
    ore_api::errors::ShippingRateError,
    traits::{ShippingRateManagement, StoreError},
};

/// Charged when neither the city nor a default rate is configured.
pub const FALLBACK_SHIPPING_FEE: Money = Money::from_const(2000);

/// `ShippingApi` resolves the shipping fee for a destination city and maintains the rate table.
pub struct ShippingApi<B> {
    db: B,
}

impl<B> Debug for ShippingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ShippingApi")
    }
}

impl<B> ShippingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ShippingApi<B>
where B: ShippingRateManagement
{
    /// The fee for shipping to `city`.
    ///
    /// The lookup order is: the active rate for the city (trimmed, case-insensitive), then the active default rate,
    /// and finally [`FALLBACK_SHIPPING_FEE`].
    pub async fn resolve(&self, city: &str) -> Result<Money, StoreError> {
        let city = city.trim();
        if !city.is_empty() {
            if let Some(rate) = self.db.find_active_rate(city).await? {
                trace!("🚚️ Shipping to {city} costs {}", rate.fee);
                return Ok(rate.fee);
            }
        }
        match self.db.find_default_rate().await? {
            Some(rate) => {
                debug!("🚚️ No rate for '{city}'. Using the default rate ({}) from {}", rate.fee, rate.city);
                Ok(rate.fee)
            },
            None => {
                warn!("🚚️ No rate for '{city}' and no default rate is configured. Using the fallback fee.");
                Ok(FALLBACK_SHIPPING_FEE)
            },
        }
    }

    pub async fn save_rate(&self, mut rate: NewShippingRate) -> Result<ShippingRate, ShippingRateError> {
        rate.city = rate.city.trim().to_string();
        if rate.city.is_empty() {
            return Err(ShippingRateError::Validation("city must not be empty".into()));
        }
        if rate.fee.is_negative() {
            return Err(ShippingRateError::Validation(format!("fee must not be negative ({})", rate.fee)));
        }
        let saved = self.db.save_rate(rate).await?;
        info!(
            "🚚️ Shipping rate for {} saved: {} (default: {}, active: {})",
            saved.city, saved.fee, saved.is_default, saved.is_active
        );
        Ok(saved)
    }

    pub async fn rates(&self) -> Result<Vec<ShippingRate>, ShippingRateError> {
        let rates = self.db.fetch_rates().await?;
        Ok(rates)
    }
}
