//! `SqliteDatabase` is the concrete SQLite backend for the reconciliation engine.
//!
//! It implements every trait in [`crate::traits`], composing the low-level functions in [`super::db`] into atomic
//! transactions where a method touches more than one row.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use sqlx::{migrate::MigrateError, Sqlite, SqlitePool, Transaction};

use super::db::{carts, db_url, new_pool, orders, products, shipping_rates};
use crate::{
    db_types::{CartItem, NewOrder, NewShippingRate, Order, OrderId, OrderStatuses, Product, ShippingRate},
    payment_objects::ProviderKind,
    traits::{
        CartManagement,
        CatalogManagement,
        OrderManagement,
        ReconciliationDatabase,
        ShippingRateManagement,
        StoreError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `ORE_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Creates a new database API object. The database file is created if it does not exist yet.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Finishes a conditional order update. If the update matched, the order is read back in the same transaction.
    async fn read_back_if_updated(
        &self,
        order_id: &OrderId,
        updated: u64,
        mut tx: Transaction<'static, Sqlite>,
    ) -> Result<Option<Order>, StoreError> {
        if updated == 0 {
            tx.commit().await?;
            trace!("🗃️ Conditional update for order {order_id} did not match");
            return Ok(None);
        }
        let order =
            orders::fetch_order(order_id, &mut tx).await?.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        Ok(Some(order))
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn create_order_and_clear_cart(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::insert_order(&order, &mut tx).await?;
        let cleared = carts::clear_cart(&order.customer.id, &mut tx).await?;
        let saved =
            orders::fetch_order(&order.id, &mut tx).await?.ok_or_else(|| StoreError::OrderNotFound(order.id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Order {} saved for customer {}. {cleared} cart lines cleared", saved.id, saved.customer_id);
        Ok(saved)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_transaction_id(transaction_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_customer(customer_id, &mut conn).await?;
        Ok(orders)
    }

    async fn attach_transaction_id(
        &self,
        order_id: &OrderId,
        provider: ProviderKind,
        transaction_id: &str,
        payment_info: &str,
    ) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated =
            orders::attach_transaction_id(order_id, provider, transaction_id, payment_info, Utc::now(), &mut tx).await?;
        self.read_back_if_updated(order_id, updated, tx).await
    }

    async fn mark_order_paid(&self, order_id: &OrderId, payment_info: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::mark_paid(order_id, payment_info, Utc::now(), &mut tx).await?;
        self.read_back_if_updated(order_id, updated, tx).await
    }

    async fn mark_payment_failed(&self, order_id: &OrderId, payment_info: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::mark_failed(order_id, payment_info, Utc::now(), &mut tx).await?;
        self.read_back_if_updated(order_id, updated, tx).await
    }

    async fn compare_and_set_statuses(
        &self,
        order_id: &OrderId,
        expected: OrderStatuses,
        new: OrderStatuses,
    ) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::compare_and_set_statuses(order_id, expected, new, Utc::now(), &mut tx).await?;
        self.read_back_if_updated(order_id, updated, tx).await
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn upsert_product(&self, product: Product) -> Result<Product, StoreError> {
        let mut tx = self.pool.begin().await?;
        products::upsert_product(&product, &mut tx).await?;
        let saved =
            products::fetch_product(&product.id, &mut tx).await?.ok_or(StoreError::ProductNotFound(product.id))?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn decrement_stock_if_sufficient(&self, product_id: &str, quantity: i64) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ok = products::decrement_stock_if_sufficient(product_id, quantity, &mut conn).await?;
        trace!("🗃️ Decrement {product_id} by {quantity}: {}", if ok { "reserved" } else { "insufficient stock" });
        Ok(ok)
    }

    async fn restore_stock(&self, product_id: &str, quantity: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        match products::restore_stock(product_id, quantity, &mut conn).await? {
            0 => Err(StoreError::ProductNotFound(product_id.to_string())),
            _ => Ok(()),
        }
    }
}

impl CartManagement for SqliteDatabase {
    async fn fetch_cart(&self, customer_id: &str) -> Result<Vec<CartItem>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let cart = carts::fetch_cart(customer_id, &mut conn).await?;
        Ok(cart)
    }

    async fn add_to_cart(&self, customer_id: &str, item: CartItem) -> Result<Vec<CartItem>, StoreError> {
        let mut tx = self.pool.begin().await?;
        carts::add_to_cart(customer_id, &item, &mut tx).await?;
        let cart = carts::fetch_cart(customer_id, &mut tx).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn clear_cart(&self, customer_id: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let n = carts::clear_cart(customer_id, &mut conn).await?;
        Ok(n)
    }
}

impl ShippingRateManagement for SqliteDatabase {
    async fn find_active_rate(&self, city: &str) -> Result<Option<ShippingRate>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rate = shipping_rates::find_active_rate(city, &mut conn).await?;
        Ok(rate)
    }

    async fn find_default_rate(&self) -> Result<Option<ShippingRate>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rate = shipping_rates::find_default_rate(&mut conn).await?;
        Ok(rate)
    }

    async fn save_rate(&self, rate: NewShippingRate) -> Result<ShippingRate, StoreError> {
        let mut tx = self.pool.begin().await?;
        let saved = shipping_rates::upsert_rate(&rate, &mut tx).await?;
        if saved.is_default {
            let cleared = shipping_rates::clear_other_defaults(&saved.city, &mut tx).await?;
            if cleared > 0 {
                debug!("🗃️ {} is now the default shipping rate. Cleared {cleared} other defaults", saved.city);
            }
        }
        tx.commit().await?;
        Ok(saved)
    }

    async fn fetch_rates(&self) -> Result<Vec<ShippingRate>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rates = shipping_rates::fetch_rates(&mut conn).await?;
        Ok(rates)
    }
}
