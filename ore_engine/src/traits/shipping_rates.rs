use crate::{
    db_types::{NewShippingRate, ShippingRate},
    traits::StoreError,
};

#[allow(async_fn_in_trait)]
pub trait ShippingRateManagement {
    /// Finds the active rate whose city matches `city` exactly, ignoring case.
    async fn find_active_rate(&self, city: &str) -> Result<Option<ShippingRate>, StoreError>;

    /// Finds the active rate flagged as the default, if any.
    async fn find_default_rate(&self) -> Result<Option<ShippingRate>, StoreError>;

    /// Creates or replaces the rate for the city. Saving a default rate clears the flag on every other rate in the
    /// same transaction, so there is at most one default.
    async fn save_rate(&self, rate: NewShippingRate) -> Result<ShippingRate, StoreError>;

    async fn fetch_rates(&self) -> Result<Vec<ShippingRate>, StoreError>;
}
