use crate::{
    db_types::{CartItem, Product},
    traits::StoreError,
};

/// Product data and stock keeping.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, StoreError>;

    /// Inserts the product, or replaces every field of an existing product with the same id.
    async fn upsert_product(&self, product: Product) -> Result<Product, StoreError>;

    /// Atomically removes `quantity` units from the product's stock, if at least that many are available.
    ///
    /// Returns `false` (and changes nothing) when there is not enough stock, which is how a lost race against a
    /// concurrent buyer is detected. Stock can never go negative.
    async fn decrement_stock_if_sufficient(&self, product_id: &str, quantity: i64) -> Result<bool, StoreError>;

    /// Gives back stock taken by [`Self::decrement_stock_if_sufficient`].
    async fn restore_stock(&self, product_id: &str, quantity: i64) -> Result<(), StoreError>;
}

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    async fn fetch_cart(&self, customer_id: &str) -> Result<Vec<CartItem>, StoreError>;

    /// Adds the item to the cart. If the product is already in the cart, the quantities are summed.
    /// Returns the updated cart.
    async fn add_to_cart(&self, customer_id: &str, item: CartItem) -> Result<Vec<CartItem>, StoreError>;

    /// Empties the cart, returning the number of lines removed.
    async fn clear_cart(&self, customer_id: &str) -> Result<u64, StoreError>;
}
