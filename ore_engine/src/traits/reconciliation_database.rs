use crate::traits::{CartManagement, CatalogManagement, OrderManagement, ShippingRateManagement, StoreError};

/// The highest level of behaviour for backends supporting the reconciliation engine.
///
/// A backend is cheap to clone (it is typically a connection pool handle) so that each API object can own a copy.
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase:
    Clone + OrderManagement + CatalogManagement + CartManagement + ShippingRateManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
