use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatuses},
    payment_objects::ProviderKind,
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(String),
    #[error("The write conflicts with an existing record: {0}")]
    Conflict(String),
    #[error("Invalid data in the store: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref de) if de.is_unique_violation() => {
                StoreError::Conflict(de.message().to_string())
            },
            _ => StoreError::DatabaseError(e.to_string()),
        }
    }
}

/// Persistence of orders and their status fields.
///
/// Every method that changes a status is a conditional write. It returns `Some(order)` when this call performed the
/// transition and `None` when the precondition no longer held (another caller got there first). Callers use that
/// distinction to decide who emits notifications, so implementations must make the check and the write atomic.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Inserts the order with its line items and empties the customer's cart, in a single atomic transaction.
    async fn create_order_and_clear_cart(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn fetch_order_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Order>, StoreError>;

    /// Orders for the customer, oldest first.
    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, StoreError>;

    /// Records the provider correlation id for a freshly opened payment session, along with the provider that owns it.
    ///
    /// The write only happens if the order is neither `PAID` nor `CANCELLED`, and it has no open session (a `PENDING`
    /// payment that already carries a transaction id). A `FAILED` payment may be retried with a new session, which
    /// puts the payment back to `PENDING`.
    async fn attach_transaction_id(
        &self,
        order_id: &OrderId,
        provider: ProviderKind,
        transaction_id: &str,
        payment_info: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Sets `payment_status = PAID` unless it already is. `order_status` moves to `PAID` only if it was `PENDING`.
    /// The payment date is stamped and `payment_info` replaced.
    async fn mark_order_paid(&self, order_id: &OrderId, payment_info: &str) -> Result<Option<Order>, StoreError>;

    /// Sets `payment_status = FAILED`, but only while it is still `PENDING`. Order status is untouched.
    async fn mark_payment_failed(&self, order_id: &OrderId, payment_info: &str) -> Result<Option<Order>, StoreError>;

    /// Writes `new` over the three status fields if and only if they currently equal `expected`.
    ///
    /// When `new` moves the payment to `PAID`, the payment date is stamped if it was not already set.
    async fn compare_and_set_statuses(
        &self,
        order_id: &OrderId,
        expected: OrderStatuses,
        new: OrderStatuses,
    ) -> Result<Option<Order>, StoreError>;
}
